//! Auto-scaling worker pool implementation

use crate::core::task::erase;
use crate::core::{CancellationReason, ClosureTask, PoolError, Result, Task, TaskError};
use crate::pool::config::{WorkerPoolConfig, WorkerPoolOptions};
use crate::pool::handle::TaskHandle;
use crate::pool::scaling::{self, ScalingController};
use crate::pool::state::{Phase, PoolState, ShutdownPlan};
use crate::pool::stats::{PoolStats, WorkerSnapshot};
use crate::pool::worker::Worker;
use crate::queue::QueuedTask;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch, Notify};
use tokio::time::Instant;
use uuid::Uuid;

#[cfg(feature = "metrics")]
use crate::pool::stats::{TypeStats, TypeStatsCollector};
#[cfg(feature = "metrics")]
use std::collections::HashMap;

/// How queued work is treated when a pool shuts down
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShutdownMode {
    /// Run every queued task to completion before stopping
    #[default]
    Graceful,
    /// Cancel queued tasks; tasks already running still finish
    Forced,
}

/// State shared between the pool handle, its workers and the controller
pub(crate) struct Shared {
    pub(crate) pool_id: Uuid,
    pub(crate) config: WorkerPoolConfig,
    pub(crate) scaling: ScalingController,
    pub(crate) runtime: Handle,
    pub(crate) state: Mutex<PoolState>,
    /// Wakes one idle worker per submitted task
    pub(crate) task_ready: Notify,
    pub(crate) controller_stop: Notify,
    /// Flips to `true` once every worker has exited
    pub(crate) terminated: watch::Sender<bool>,
    #[cfg(feature = "metrics")]
    pub(crate) type_stats: TypeStatsCollector,
}

impl Shared {
    /// Start shutting down; returns false if shutdown was already underway
    ///
    /// Queued tasks are cancelled (forced mode) and every worker is signalled
    /// here. Joining the workers happens in a spawned task, so the pool still
    /// reaches `Terminated` if no caller awaits it.
    pub(crate) fn begin_shutdown(self: &Arc<Self>, mode: ShutdownMode) -> bool {
        let plan = self.state.lock().begin_shutdown(mode);
        let Some(ShutdownPlan {
            cancelled,
            signals,
            workers,
            controller,
        }) = plan
        else {
            return false;
        };

        info!(
            "[{}] shutting down ({:?}): {} queued tasks cancelled, {} workers signalled",
            self.config.pool_name,
            mode,
            cancelled.len(),
            signals.len()
        );

        for task in cancelled {
            let task_id = task.id;
            task.cancel(PoolError::cancelled(task_id, CancellationReason::Shutdown));
        }
        self.controller_stop.notify_one();
        for signal in &signals {
            signal.notify_one();
        }

        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            if let Some(controller) = controller {
                if let Err(e) = controller.await {
                    warn!(
                        "[{}] scaling controller did not stop cleanly: {}",
                        shared.config.pool_name, e
                    );
                }
            }
            for worker in workers {
                if let Err(e) = worker.await {
                    warn!("[{}] worker did not exit cleanly: {}", shared.config.pool_name, e);
                }
            }

            let stats = {
                let mut state = shared.state.lock();
                state.phase = Phase::Terminated;
                state.snapshot()
            };
            info!(
                "[{}] worker pool {} terminated: {} completed, {} failed, {} cancelled",
                shared.config.pool_name,
                shared.pool_id,
                stats.total_tasks_completed,
                stats.total_errors,
                stats.total_cancelled
            );
            #[cfg(feature = "tracing")]
            crate::telemetry::record_pool_shutdown(
                stats.total_tasks_completed,
                stats.total_errors,
            );

            shared.terminated.send_replace(true);
        });
        true
    }
}

/// An auto-scaling pool of async workers draining a FIFO task queue
///
/// The pool keeps between `min_workers` and `max_workers` workers alive. A
/// worker is added whenever the backlog (queued tasks minus idle workers)
/// reaches the configured threshold, and an idle worker is retired once per
/// cooldown period while the queue is empty.
///
/// The pool must be created inside a tokio runtime; tasks can then be
/// submitted from any thread.
///
/// # Example
///
/// ```rust
/// use rust_worker_pool::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let pool = WorkerPool::new(WorkerPoolConfig::new(1, 4))?;
///
/// let handle = pool.execute(|| async { Ok::<_, TaskError>(21 * 2) })?;
/// assert_eq!(handle.await?, 42);
///
/// pool.shutdown(ShutdownMode::Graceful).await;
/// assert!(pool.is_terminated());
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a pool and start its minimum set of workers
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid
    /// and [`PoolError::RuntimeUnavailable`] when called outside a tokio
    /// runtime.
    pub fn new(config: WorkerPoolConfig) -> Result<Self> {
        config.validate()?;
        let runtime =
            Handle::try_current().map_err(|e| PoolError::runtime_unavailable(e.to_string()))?;
        let (terminated, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            pool_id: Uuid::new_v4(),
            scaling: ScalingController::from_config(&config),
            state: Mutex::new(PoolState::new(config.max_queue_size)),
            config,
            runtime,
            task_ready: Notify::new(),
            controller_stop: Notify::new(),
            terminated,
            #[cfg(feature = "metrics")]
            type_stats: TypeStatsCollector::default(),
        });

        {
            let mut state = shared.state.lock();
            for _ in 0..shared.config.min_workers {
                Worker::spawn(&shared, &mut state);
            }
            if !shared.scaling.is_inert() {
                let controller = shared.runtime.spawn(scaling::run(Arc::clone(&shared)));
                state.set_controller(controller);
            }
        }

        info!(
            "[{}] worker pool {} started: {} workers (max {}), cooldown {:?}",
            shared.config.pool_name,
            shared.pool_id,
            shared.config.min_workers,
            shared.config.max_workers,
            shared.config.scale_down_cooldown
        );
        #[cfg(feature = "tracing")]
        crate::telemetry::record_pool_start(shared.config.min_workers, &shared.config.pool_name);

        Ok(Self { shared })
    }

    /// Create a pool with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(WorkerPoolConfig::default())
    }

    /// Create a pool from serializable options
    pub fn from_options(options: WorkerPoolOptions) -> Result<Self> {
        Self::new(WorkerPoolConfig::try_from(options)?)
    }

    /// Submit a task for execution
    ///
    /// Returns a handle that resolves with the task's result. Never waits for
    /// the task to start.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolClosed`] once shutdown has begun and
    /// [`PoolError::QueueFull`] when a bounded queue is at capacity.
    pub fn submit<T: Task>(&self, task: T) -> Result<TaskHandle<T::Output>> {
        let shared = &self.shared;
        let task_type = task.task_type().to_string();
        let (result_tx, result_rx) = oneshot::channel();

        let (task_id, queue_len) = {
            let mut state = shared.state.lock();
            if !state.is_running() {
                return Err(PoolError::pool_closed(&shared.config.pool_name));
            }

            let task_id = state.next_task_id();
            state
                .queue
                .push(QueuedTask::new(task_id, task_type.as_str(), erase(task, result_tx)))?;
            state.stats.record_submission();
            #[cfg(feature = "metrics")]
            shared.type_stats.record_submission(&task_type);

            let counts = state.counts();
            let queue_len = state.queue.len();
            if shared
                .scaling
                .should_scale_up(counts, state.arena_len(), queue_len)
            {
                let worker_id = Worker::spawn(shared, &mut state);
                info!(
                    "[{}] scaled up: worker {} spawned for backlog of {} ({} workers)",
                    shared.config.pool_name,
                    worker_id,
                    ScalingController::backlog(counts, queue_len),
                    state.arena_len()
                );
                #[cfg(feature = "tracing")]
                crate::telemetry::record_scale_up(worker_id, state.arena_len());
            }
            (task_id, queue_len)
        };

        shared.task_ready.notify_one();
        trace!(
            "[{}] task #{} ({}) queued, queue length {}",
            shared.config.pool_name,
            task_id,
            task_type,
            queue_len
        );
        #[cfg(feature = "tracing")]
        crate::telemetry::record_submission(queue_len);

        Ok(TaskHandle::new(task_id, result_rx, Arc::downgrade(shared)))
    }

    /// Submit an async closure for execution
    ///
    /// ```rust
    /// # use rust_worker_pool::prelude::*;
    /// # #[tokio::main]
    /// # async fn main() -> Result<()> {
    /// # let pool = WorkerPool::with_defaults()?;
    /// let handle = pool.execute(|| async { Ok::<_, TaskError>("done") })?;
    /// assert_eq!(handle.await?, "done");
    /// # pool.shutdown(ShutdownMode::Graceful).await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute<F, Fut, T, E>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<TaskError> + 'static,
    {
        self.submit(ClosureTask::new(f))
    }

    /// Submit a task that runs inside the caller's current tracing span
    #[cfg(feature = "tracing")]
    pub fn submit_traced<T: Task>(&self, task: T) -> Result<TaskHandle<T::Output>> {
        self.submit(crate::telemetry::TracedTask::new(task))
    }

    /// Consistent snapshot of workers, queue and counters
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().snapshot()
    }

    /// Per-worker view, ordered by worker id
    pub fn worker_stats(&self) -> Vec<WorkerSnapshot> {
        self.shared.state.lock().worker_snapshots(Instant::now())
    }

    /// Statistics keyed by [`Task::task_type`]
    #[cfg(feature = "metrics")]
    pub fn task_type_stats(&self) -> HashMap<String, TypeStats> {
        self.shared.type_stats.snapshot()
    }

    /// Stop accepting tasks and wait for every worker to exit
    ///
    /// With [`ShutdownMode::Graceful`] every queued task still runs. With
    /// [`ShutdownMode::Forced`] queued tasks resolve with
    /// [`PoolError::Cancelled`]; running tasks are never interrupted.
    ///
    /// Calling this again, in either mode, only waits for the first call's
    /// shutdown to complete.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        if !self.shared.begin_shutdown(mode) {
            debug!(
                "[{}] shutdown already in progress, waiting for it",
                self.shared.config.pool_name
            );
        }

        let mut terminated = self.shared.terminated.subscribe();
        // The sender lives in `Shared`, which `self` keeps alive
        let _ = terminated.wait_for(|done| *done).await;
    }

    /// Check if the pool accepts new tasks
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().is_running()
    }

    /// Check if shutdown has completed
    pub fn is_terminated(&self) -> bool {
        self.shared.state.lock().phase == Phase::Terminated
    }

    /// Get pool configuration
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }

    /// Unique id of this pool instance
    pub fn pool_id(&self) -> Uuid {
        self.shared.pool_id
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkerPool")
            .field("pool_id", &self.shared.pool_id)
            .field("pool_name", &self.shared.config.pool_name)
            .field("phase", &state.phase)
            .field("workers", &state.arena_len())
            .field("queue_length", &state.queue.len())
            .field("queue_capacity", &state.queue.capacity())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.shared.begin_shutdown(ShutdownMode::Graceful) {
            debug!(
                "[{}] pool dropped while running, shutting down in background",
                self.shared.config.pool_name
            );
        }
    }
}
