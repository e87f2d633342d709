//! Handle for awaiting or cancelling a submitted task

use crate::core::{CancellationReason, PoolError, Result};
use crate::pool::worker_pool::Shared;
use log::debug;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Handle to a submitted task
///
/// Awaiting the handle yields the task's result. Dropping it does not
/// cancel the task; the result is simply discarded.
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let pool = WorkerPool::new(WorkerPoolConfig::fixed(1))?;
///
/// let handle = pool.execute(|| async { Ok::<_, TaskError>("quote") })?;
/// println!("submitted task #{}", handle.id());
/// assert_eq!(handle.await?, "quote");
/// # pool.shutdown(ShutdownMode::Graceful).await;
/// # Ok(())
/// # }
/// ```
pub struct TaskHandle<T> {
    task_id: u64,
    result_rx: oneshot::Receiver<Result<T>>,
    pool: Weak<Shared>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(task_id: u64, result_rx: oneshot::Receiver<Result<T>>, pool: Weak<Shared>) -> Self {
        Self {
            task_id,
            result_rx,
            pool,
        }
    }

    /// Submission sequence number of the task
    pub fn id(&self) -> u64 {
        self.task_id
    }

    /// Remove the task from the queue if no worker has claimed it yet
    ///
    /// Returns `true` if the task was removed; awaiting the handle then
    /// yields [`PoolError::Cancelled`]. Returns `false` when the task is
    /// already running or finished, in which case it runs to completion.
    pub fn cancel(&self) -> bool {
        let Some(shared) = self.pool.upgrade() else {
            return false;
        };

        let removed = {
            let mut state = shared.state.lock();
            let removed = state.queue.remove(self.task_id);
            if removed.is_some() {
                state.stats.record_cancelled(1);
            }
            removed
        };

        match removed {
            Some(task) => {
                task.cancel(PoolError::cancelled(self.task_id, CancellationReason::Manual));
                debug!(
                    "[{}] task #{} cancelled before running",
                    shared.config.pool_name, self.task_id
                );
                true
            }
            None => false,
        }
    }
}

impl<T> Unpin for TaskHandle<T> {}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let task_id = self.task_id;
        Pin::new(&mut self.result_rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(PoolError::result_lost(task_id))))
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.task_id)
            .finish()
    }
}
