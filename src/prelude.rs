//! Convenient re-exports for common types and traits

pub use crate::core::{ClosureTask, PoolError, Result, Task, TaskError};
pub use crate::pool::{
    PoolStats, ShutdownMode, TaskHandle, WorkerPool, WorkerPoolConfig, WorkerSnapshot,
};
