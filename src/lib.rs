//! # Rust Worker Pool
//!
//! An auto-scaling async worker pool built on tokio, for absorbing bursts of
//! concurrent fetch-style work.
//!
//! ## Features
//!
//! - **Auto-scaling**: Grows by one worker whenever the backlog reaches a threshold
//!   and retires long-idle workers one per cooldown period, always within
//!   `min_workers..=max_workers`
//! - **FIFO Queue**: Tasks start in submission order; unbounded by default
//! - **Utilization Stats**: Consistent snapshots of busy/idle workers, queue depth
//!   and completion counters
//! - **Panic Safety**: Task panics are reported as errors and never kill a worker
//! - **Graceful Shutdown**: Drain the queue, or cancel it while letting running
//!   tasks finish
//! - **Observability**: `log` events always, `tracing` spans and metric events
//!   with the `tracing` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let pool = WorkerPool::with_defaults()?;
//!
//! let handles = (0..10)
//!     .map(|i| pool.execute(move || async move { Ok::<_, TaskError>(i * 2) }))
//!     .collect::<Result<Vec<_>>>()?;
//!
//! for handle in handles {
//!     println!("result: {}", handle.await?);
//! }
//!
//! pool.shutdown(ShutdownMode::Graceful).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let config = WorkerPoolConfig::new(2, 16)
//!     .with_scale_down_cooldown(Duration::from_secs(10))
//!     .with_scale_up_backlog_threshold(4)
//!     .with_max_queue_size(1000)
//!     .with_pool_name("market-data");
//!
//! let pool = WorkerPool::new(config)?;
//! # pool.shutdown(ShutdownMode::Graceful).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Tasks
//!
//! ```rust
//! use futures::future::BoxFuture;
//! use futures::FutureExt;
//! use rust_worker_pool::prelude::*;
//!
//! struct FetchQuote {
//!     symbol: String,
//! }
//!
//! impl Task for FetchQuote {
//!     type Output = f64;
//!
//!     fn run(self) -> BoxFuture<'static, std::result::Result<f64, TaskError>> {
//!         async move {
//!             if self.symbol.is_empty() {
//!                 return Err("empty symbol".into());
//!             }
//!             Ok(512.5)
//!         }
//!         .boxed()
//!     }
//!
//!     fn task_type(&self) -> &str {
//!         "FetchQuote"
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! # let pool = WorkerPool::new(WorkerPoolConfig::fixed(2))?;
//! let price = pool
//!     .submit(FetchQuote {
//!         symbol: "NABIL".to_string(),
//!     })?
//!     .await?;
//! assert_eq!(price, 512.5);
//! # pool.shutdown(ShutdownMode::Graceful).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Statistics
//!
//! ```rust
//! use rust_worker_pool::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! # let pool = WorkerPool::with_defaults()?;
//! # pool.execute(|| async { Ok::<_, TaskError>(()) })?.await?;
//! let stats = pool.stats();
//! assert_eq!(stats.total_workers, stats.busy_workers + stats.idle_workers);
//! println!(
//!     "{} workers ({} busy), {} queued, {} completed",
//!     stats.total_workers, stats.busy_workers, stats.queue_length, stats.total_tasks_completed
//! );
//!
//! for worker in pool.worker_stats() {
//!     println!("Worker {}: {:?}, {} tasks", worker.id, worker.state, worker.tasks_completed);
//! }
//! # pool.shutdown(ShutdownMode::Graceful).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod global;
pub mod pool;
pub mod prelude;
mod queue;

#[cfg(feature = "tracing")]
pub mod telemetry;

pub use crate::core::{CancellationReason, ClosureTask, PoolError, Result, Task, TaskError};
pub use pool::{
    PoolStats, ShutdownMode, TaskHandle, WorkerPool, WorkerPoolConfig, WorkerPoolOptions,
    WorkerSnapshot, WorkerState,
};

#[cfg(feature = "metrics")]
pub use pool::TypeStats;

#[cfg(feature = "tracing")]
pub use telemetry::TracedTask;
