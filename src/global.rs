//! Process-wide default pool.
//!
//! A convenience layer over [`WorkerPool`] for applications that want one
//! shared pool without threading it through every call site. The pool is
//! created explicitly with [`init_global_pool`] and torn down with
//! [`shutdown_global_pool`]; after teardown a new pool may be installed.
//!
//! ```rust
//! use rust_worker_pool::global;
//! use rust_worker_pool::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! global::init_global_pool(WorkerPoolConfig::new(1, 4))?;
//!
//! let handle = global::global_pool()?.execute(|| async { Ok::<_, TaskError>(1) })?;
//! assert_eq!(handle.await?, 1);
//! println!("{:?}", global::global_pool_stats()?);
//!
//! global::shutdown_global_pool(ShutdownMode::Graceful).await?;
//! # Ok(())
//! # }
//! ```

use crate::core::{PoolError, Result};
use crate::pool::{PoolStats, ShutdownMode, WorkerPool, WorkerPoolConfig};
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_POOL: RwLock<Option<Arc<WorkerPool>>> = parking_lot::const_rwlock(None);

/// Create the global pool
///
/// # Errors
///
/// Returns [`PoolError::GlobalPoolAlreadyInitialized`] if a running pool is
/// already installed, or any error from [`WorkerPool::new`].
pub fn init_global_pool(config: WorkerPoolConfig) -> Result<Arc<WorkerPool>> {
    let mut slot = GLOBAL_POOL.write();
    if slot.as_ref().is_some_and(|pool| pool.is_running()) {
        return Err(PoolError::GlobalPoolAlreadyInitialized);
    }

    let pool = Arc::new(WorkerPool::new(config)?);
    info!("global worker pool {} installed", pool.pool_id());
    *slot = Some(Arc::clone(&pool));
    Ok(pool)
}

/// Get the global pool
pub fn global_pool() -> Result<Arc<WorkerPool>> {
    GLOBAL_POOL
        .read()
        .clone()
        .ok_or(PoolError::GlobalPoolUninitialized)
}

/// Snapshot of the global pool's statistics
pub fn global_pool_stats() -> Result<PoolStats> {
    global_pool().map(|pool| pool.stats())
}

/// Shut down and uninstall the global pool
///
/// # Errors
///
/// Returns [`PoolError::GlobalPoolUninitialized`] if no pool is installed.
pub async fn shutdown_global_pool(mode: ShutdownMode) -> Result<()> {
    let pool = GLOBAL_POOL
        .write()
        .take()
        .ok_or(PoolError::GlobalPoolUninitialized)?;
    pool.shutdown(mode).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskError;

    // Single test so parallel test threads never race on the global slot
    #[tokio::test]
    async fn test_global_pool_lifecycle() {
        assert!(matches!(
            global_pool(),
            Err(PoolError::GlobalPoolUninitialized)
        ));
        assert!(global_pool_stats().is_err());

        let pool = init_global_pool(WorkerPoolConfig::new(1, 2)).expect("Failed to init pool");
        assert!(matches!(
            init_global_pool(WorkerPoolConfig::default()),
            Err(PoolError::GlobalPoolAlreadyInitialized)
        ));

        let handle = global_pool()
            .expect("pool installed")
            .execute(|| async { Ok::<_, TaskError>(10) })
            .expect("Failed to submit task");
        assert_eq!(handle.await.expect("task should succeed"), 10);
        assert_eq!(
            global_pool_stats()
                .expect("pool installed")
                .total_tasks_completed,
            1
        );

        shutdown_global_pool(ShutdownMode::Graceful)
            .await
            .expect("Failed to shut down pool");
        assert!(pool.is_terminated());
        assert!(matches!(
            shutdown_global_pool(ShutdownMode::Graceful).await,
            Err(PoolError::GlobalPoolUninitialized)
        ));

        // Re-initialization after teardown
        init_global_pool(WorkerPoolConfig::fixed(1)).expect("Failed to re-init pool");
        shutdown_global_pool(ShutdownMode::Forced)
            .await
            .expect("Failed to shut down pool");
    }
}
