//! Worker task implementation

use crate::core::task::panic_message;
use crate::pool::state::{Claim, PoolState};
use crate::pool::worker_pool::Shared;
use crate::queue::QueuedTask;
use futures::FutureExt;
use log::{debug, error, trace, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(feature = "tracing")]
use tracing::Instrument;

/// A pool worker: a tokio task that claims queued tasks one at a time
///
/// Workers carry no state of their own. Everything observable about them
/// (state, counters, idle time) lives in their arena slot inside
/// [`PoolState`], so statistics never need to reach into a running task.
pub(crate) struct Worker;

/// Removes the worker's arena slot if its task ends without a clean exit
struct SlotGuard {
    shared: Arc<Shared>,
    id: usize,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let pending = self.shared.state.lock().abandon(self.id);
        if let Some(pass_wakeup) = pending {
            warn!(
                "[{}] worker {} stopped without leaving its loop",
                self.shared.config.pool_name, self.id
            );
            if pass_wakeup {
                self.shared.task_ready.notify_one();
            }
        }
    }
}

impl Worker {
    /// Register a new idle worker and start its loop on the pool runtime
    ///
    /// Must be called with the pool lock held, which is what makes the
    /// arena size check and the insertion a single step.
    pub(crate) fn spawn(shared: &Arc<Shared>, state: &mut PoolState) -> usize {
        let signal = Arc::new(Notify::new());
        let id = state.register_worker(Arc::clone(&signal));
        let handle = shared
            .runtime
            .spawn(Self::run(Arc::clone(shared), id, signal));
        state.push_handle(handle);
        id
    }

    /// Main worker loop
    ///
    /// The shared `task_ready` notification is enabled before the queue is
    /// inspected, so a submission that lands between the check and the wait
    /// still wakes this worker. The per-worker `signal` is only used for
    /// retirement and shutdown; `Notify` keeps a permit if the worker is not
    /// waiting yet.
    async fn run(shared: Arc<Shared>, id: usize, signal: Arc<Notify>) {
        debug!("[{}] worker {} started", shared.config.pool_name, id);
        let _slot = SlotGuard {
            shared: Arc::clone(&shared),
            id,
        };

        loop {
            let task_ready = shared.task_ready.notified();
            tokio::pin!(task_ready);
            task_ready.as_mut().enable();

            let claim = shared.state.lock().claim(id);
            match claim {
                Claim::Run(task) => {
                    let started = Instant::now();
                    let executed = AssertUnwindSafe(Self::execute(&shared, id, task))
                        .catch_unwind()
                        .await;
                    if let Err(panic_info) = executed {
                        Self::recover(&shared, id, started, &*panic_info);
                    }
                }
                Claim::Wait => {
                    tokio::select! {
                        _ = &mut task_ready => {}
                        _ = signal.notified() => {}
                    }
                }
                Claim::Exit { pass_wakeup } => {
                    if pass_wakeup {
                        shared.task_ready.notify_one();
                    }
                    break;
                }
            }
        }

        debug!("[{}] worker {} exited", shared.config.pool_name, id);
    }

    /// Settle the books after `execute` itself unwound
    fn recover(
        shared: &Shared,
        worker_id: usize,
        started: Instant,
        panic_info: &(dyn std::any::Any + Send),
    ) {
        let recorded = shared
            .state
            .lock()
            .finish_unwound(worker_id, started.elapsed());
        if recorded {
            error!(
                "[{}] worker {} panicked before recording its task: {}",
                shared.config.pool_name,
                worker_id,
                panic_message(panic_info)
            );
        } else {
            error!(
                "[{}] worker {} panicked while delivering a result: {}",
                shared.config.pool_name,
                worker_id,
                panic_message(panic_info)
            );
        }
    }

    /// Execute a single task with panic protection and record its outcome
    async fn execute(shared: &Shared, worker_id: usize, queued: QueuedTask) {
        let QueuedTask {
            id: task_id,
            task_type,
            enqueued_at,
            task,
        } = queued;

        let started = Instant::now();
        trace!(
            "[{}] worker {} took task #{} ({}) after {:?} in queue",
            shared.config.pool_name,
            worker_id,
            task_id,
            task_type,
            started.saturating_duration_since(enqueued_at)
        );

        #[cfg(feature = "tracing")]
        crate::telemetry::record_worker_busy(worker_id);

        let run = task.run(task_id);
        #[cfg(feature = "tracing")]
        let run = run.instrument(tracing::debug_span!(
            "task_execution",
            task_id = task_id,
            task_type = %task_type,
            worker_id = worker_id
        ));
        let completion = run.await;
        let elapsed = started.elapsed();

        if let Some(failure) = &completion.failure {
            warn!(
                "[{}] worker {}: task #{} ({}) failed after {:?}: {}",
                shared.config.pool_name, worker_id, task_id, task_type, elapsed, failure
            );
        }

        #[cfg(feature = "metrics")]
        shared
            .type_stats
            .record_outcome(&task_type, completion.outcome, elapsed);

        shared
            .state
            .lock()
            .finish(worker_id, completion.outcome, elapsed);

        #[cfg(feature = "tracing")]
        {
            use crate::core::task::TaskOutcome;
            match completion.outcome {
                TaskOutcome::Succeeded => crate::telemetry::record_completion(elapsed, true),
                TaskOutcome::Failed => crate::telemetry::record_completion(elapsed, false),
                TaskOutcome::Panicked => crate::telemetry::record_panic(elapsed),
            }
            crate::telemetry::record_worker_idle(worker_id);
        }

        // Counters are already visible when the caller observes the result
        completion.deliver();
    }
}
