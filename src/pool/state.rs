//! Mutable pool state guarded by the pool lock.
//!
//! Everything a statistics snapshot reads lives here: the queue, the worker
//! arena, the counters and the lifecycle phase. Structural changes to the
//! worker set (spawn, retire, exit) are only made through these methods
//! while the lock is held, which serializes scale-up and scale-down.

use crate::core::task::TaskOutcome;
use crate::pool::stats::{PoolStats, StatsAggregator, WorkerCounts, WorkerSnapshot, WorkerState};
use crate::pool::worker_pool::ShutdownMode;
use crate::queue::{QueuedTask, TaskQueue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Lifecycle of a pool; only ever moves forward
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    ShuttingDown(ShutdownMode),
    Terminated,
}

/// Arena entry for one worker
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    pub(crate) state: WorkerState,
    pub(crate) tasks_completed: u64,
    pub(crate) errors: u64,
    pub(crate) idle_since: Instant,
    /// Wakes the worker for retirement or shutdown
    pub(crate) signal: Arc<Notify>,
}

/// What a worker should do next
#[derive(Debug)]
pub(crate) enum Claim {
    Run(QueuedTask),
    Wait,
    /// The worker has been removed from the arena and must stop.
    /// `pass_wakeup` is set when tasks are still queued, so the exiting
    /// worker hands any wake-up it consumed to another worker.
    Exit { pass_wakeup: bool },
}

/// Everything the shutdown procedure needs once the lock is released
pub(crate) struct ShutdownPlan {
    pub(crate) cancelled: Vec<QueuedTask>,
    pub(crate) signals: Vec<Arc<Notify>>,
    pub(crate) workers: Vec<JoinHandle<()>>,
    pub(crate) controller: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub(crate) struct PoolState {
    pub(crate) phase: Phase,
    pub(crate) queue: TaskQueue,
    pub(crate) stats: StatsAggregator,
    workers: BTreeMap<usize, WorkerSlot>,
    next_worker_id: usize,
    next_task_id: u64,
    join_handles: Vec<JoinHandle<()>>,
    controller: Option<JoinHandle<()>>,
}

impl PoolState {
    pub(crate) fn new(max_queue_size: usize) -> Self {
        Self {
            phase: Phase::Running,
            queue: TaskQueue::new(max_queue_size),
            stats: StatsAggregator::default(),
            workers: BTreeMap::new(),
            next_worker_id: 0,
            next_task_id: 1,
            join_handles: Vec::new(),
            controller: None,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Allocate the next submission sequence number
    pub(crate) fn next_task_id(&mut self) -> u64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    /// Busy and idle workers; retiring workers are not counted
    pub(crate) fn counts(&self) -> WorkerCounts {
        self.workers
            .values()
            .fold(WorkerCounts::default(), |mut counts, slot| {
                match slot.state {
                    WorkerState::Busy => counts.busy += 1,
                    WorkerState::Idle => counts.idle += 1,
                    WorkerState::Terminating => {}
                }
                counts
            })
    }

    /// Workers still present in the arena, retiring ones included
    pub(crate) fn arena_len(&self) -> usize {
        self.workers.len()
    }

    /// `(id, state, idle_since)` of every worker in the arena
    pub(crate) fn worker_states(&self) -> impl Iterator<Item = (usize, WorkerState, Instant)> + '_ {
        self.workers
            .iter()
            .map(|(id, slot)| (*id, slot.state, slot.idle_since))
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        self.stats.snapshot(self.counts(), self.queue.len())
    }

    pub(crate) fn worker_snapshots(&self, now: Instant) -> Vec<WorkerSnapshot> {
        self.workers
            .iter()
            .map(|(id, slot)| WorkerSnapshot {
                id: *id,
                state: slot.state,
                tasks_completed: slot.tasks_completed,
                errors: slot.errors,
                idle_for: (slot.state == WorkerState::Idle)
                    .then(|| now.saturating_duration_since(slot.idle_since)),
            })
            .collect()
    }

    /// Add an idle worker to the arena and return its id
    pub(crate) fn register_worker(&mut self, signal: Arc<Notify>) -> usize {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        self.workers.insert(
            id,
            WorkerSlot {
                state: WorkerState::Idle,
                tasks_completed: 0,
                errors: 0,
                idle_since: Instant::now(),
                signal,
            },
        );
        id
    }

    pub(crate) fn push_handle(&mut self, handle: JoinHandle<()>) {
        self.join_handles.push(handle);
    }

    pub(crate) fn set_controller(&mut self, handle: JoinHandle<()>) {
        self.controller = Some(handle);
    }

    /// Forget join handles of workers that already exited
    pub(crate) fn prune_finished_handles(&mut self) {
        self.join_handles.retain(|handle| !handle.is_finished());
    }

    /// Decide the next step for `worker_id`
    pub(crate) fn claim(&mut self, worker_id: usize) -> Claim {
        let Some(slot) = self.workers.get_mut(&worker_id) else {
            return Claim::Exit {
                pass_wakeup: !self.queue.is_empty(),
            };
        };

        if slot.state == WorkerState::Terminating {
            self.workers.remove(&worker_id);
            return Claim::Exit {
                pass_wakeup: !self.queue.is_empty(),
            };
        }

        if let Some(task) = self.queue.pop() {
            slot.state = WorkerState::Busy;
            return Claim::Run(task);
        }

        if self.phase != Phase::Running {
            // Queue drained (or discarded) during shutdown
            self.workers.remove(&worker_id);
            return Claim::Exit { pass_wakeup: false };
        }

        slot.state = WorkerState::Idle;
        Claim::Wait
    }

    /// Record a finished task and move the worker back to idle
    pub(crate) fn finish(&mut self, worker_id: usize, outcome: TaskOutcome, elapsed: Duration) {
        self.stats.record_outcome(outcome, elapsed);
        if let Some(slot) = self.workers.get_mut(&worker_id) {
            match outcome {
                TaskOutcome::Succeeded => slot.tasks_completed += 1,
                TaskOutcome::Failed | TaskOutcome::Panicked => slot.errors += 1,
            }
            slot.state = WorkerState::Idle;
            slot.idle_since = Instant::now();
        }
    }

    /// Settle a task whose execution unwound before it was recorded
    ///
    /// Counts a panic only if the worker is still marked busy; returns
    /// whether anything was recorded.
    pub(crate) fn finish_unwound(&mut self, worker_id: usize, elapsed: Duration) -> bool {
        match self.workers.get(&worker_id) {
            Some(slot) if slot.state == WorkerState::Busy => {
                self.finish(worker_id, TaskOutcome::Panicked, elapsed);
                true
            }
            _ => false,
        }
    }

    /// Drop a worker whose task ended without going through `claim`
    ///
    /// Returns `None` if the slot was already gone, otherwise whether a
    /// queued task still needs a worker.
    pub(crate) fn abandon(&mut self, worker_id: usize) -> Option<bool> {
        self.workers.remove(&worker_id)?;
        Some(!self.queue.is_empty())
    }

    /// Mark an idle worker for retirement and return its wake-up signal
    pub(crate) fn retire(&mut self, worker_id: usize) -> Option<Arc<Notify>> {
        let slot = self.workers.get_mut(&worker_id)?;
        if slot.state != WorkerState::Idle {
            return None;
        }
        slot.state = WorkerState::Terminating;
        Some(Arc::clone(&slot.signal))
    }

    /// Leave the running phase; returns `None` if shutdown already began
    pub(crate) fn begin_shutdown(&mut self, mode: ShutdownMode) -> Option<ShutdownPlan> {
        if !self.is_running() {
            return None;
        }
        self.phase = Phase::ShuttingDown(mode);

        let cancelled = match mode {
            ShutdownMode::Graceful => Vec::new(),
            ShutdownMode::Forced => self.queue.drain(),
        };
        self.stats.record_cancelled(cancelled.len());

        Some(ShutdownPlan {
            cancelled,
            signals: self
                .workers
                .values()
                .map(|slot| Arc::clone(&slot.signal))
                .collect(),
            workers: std::mem::take(&mut self.join_handles),
            controller: self.controller.take(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::erase;
    use crate::core::{ClosureTask, TaskError};
    use tokio::sync::oneshot;

    fn queue_task(state: &mut PoolState) -> u64 {
        let (tx, _rx) = oneshot::channel();
        let id = state.next_task_id();
        let task = ClosureTask::new(|| async { Ok::<_, TaskError>(()) });
        state
            .queue
            .push(QueuedTask::new(id, "test", erase(task, tx)))
            .expect("unbounded queue");
        id
    }

    #[test]
    fn test_claim_marks_worker_busy() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        let task_id = queue_task(&mut state);

        match state.claim(worker) {
            Claim::Run(task) => assert_eq!(task.id, task_id),
            other => panic!("expected Run, got {:?}", other),
        }
        assert_eq!(state.counts(), WorkerCounts { busy: 1, idle: 0 });

        state.finish(worker, TaskOutcome::Succeeded, Duration::from_millis(5));
        assert_eq!(state.counts(), WorkerCounts { busy: 0, idle: 1 });
        assert_eq!(state.snapshot().total_tasks_completed, 1);
        assert!(matches!(state.claim(worker), Claim::Wait));
    }

    #[test]
    fn test_retired_worker_exits_and_passes_wakeup() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        let _other = state.register_worker(Arc::new(Notify::new()));

        assert!(state.retire(worker).is_some());
        assert_eq!(state.counts(), WorkerCounts { busy: 0, idle: 1 });
        assert_eq!(state.arena_len(), 2);

        queue_task(&mut state);
        assert!(matches!(
            state.claim(worker),
            Claim::Exit { pass_wakeup: true }
        ));
        assert_eq!(state.arena_len(), 1);
    }

    #[test]
    fn test_busy_worker_cannot_be_retired() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        queue_task(&mut state);
        assert!(matches!(state.claim(worker), Claim::Run(_)));

        assert!(state.retire(worker).is_none());
        assert_eq!(state.counts(), WorkerCounts { busy: 1, idle: 0 });
    }

    #[test]
    fn test_forced_shutdown_drains_queue() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        for _ in 0..3 {
            queue_task(&mut state);
        }

        let plan = state
            .begin_shutdown(ShutdownMode::Forced)
            .expect("first shutdown");
        assert_eq!(plan.cancelled.len(), 3);
        assert_eq!(plan.signals.len(), 1);
        assert!(state.queue.is_empty());
        assert_eq!(state.snapshot().total_cancelled, 3);

        assert!(state.begin_shutdown(ShutdownMode::Forced).is_none());
        assert!(matches!(
            state.claim(worker),
            Claim::Exit { pass_wakeup: false }
        ));
        assert_eq!(state.arena_len(), 0);
    }

    #[test]
    fn test_graceful_shutdown_keeps_queue() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        queue_task(&mut state);

        let plan = state
            .begin_shutdown(ShutdownMode::Graceful)
            .expect("first shutdown");
        assert!(plan.cancelled.is_empty());

        assert!(matches!(state.claim(worker), Claim::Run(_)));
        state.finish(worker, TaskOutcome::Failed, Duration::ZERO);
        assert!(matches!(state.claim(worker), Claim::Exit { .. }));
        assert_eq!(state.snapshot().total_errors, 1);
    }

    #[test]
    fn test_unwound_task_is_recorded_once() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        queue_task(&mut state);
        assert!(matches!(state.claim(worker), Claim::Run(_)));

        assert!(state.finish_unwound(worker, Duration::from_millis(3)));
        assert!(!state.finish_unwound(worker, Duration::from_millis(3)));
        assert_eq!(state.counts(), WorkerCounts { busy: 0, idle: 1 });

        let stats = state.snapshot();
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.total_panics, 1);
    }

    #[test]
    fn test_abandoned_worker_leaves_arena() {
        let mut state = PoolState::new(0);
        let worker = state.register_worker(Arc::new(Notify::new()));
        queue_task(&mut state);
        queue_task(&mut state);
        assert!(matches!(state.claim(worker), Claim::Run(_)));

        assert_eq!(state.abandon(worker), Some(true));
        assert_eq!(state.abandon(worker), None);
        assert_eq!(state.arena_len(), 0);
        assert_eq!(state.counts(), WorkerCounts { busy: 0, idle: 0 });
    }
}
