//! Worker pool, its workers and the scaling controller

pub mod config;
mod handle;
mod scaling;
mod state;
pub mod stats;
mod worker;
mod worker_pool;

pub use config::{WorkerPoolConfig, WorkerPoolOptions};
pub use handle::TaskHandle;
pub use stats::{PoolStats, WorkerSnapshot, WorkerState};
pub use worker_pool::{ShutdownMode, WorkerPool};

#[cfg(feature = "metrics")]
pub use stats::TypeStats;
