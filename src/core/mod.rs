//! Core types and traits for the worker pool

pub mod error;
pub mod task;

pub use error::{CancellationReason, PoolError, Result};
pub use task::{ClosureTask, Task, TaskError};
