//! Scaling decisions and the periodic scale-down tick.
//!
//! The decision functions on [`ScalingController`] are pure: they read a
//! view of the pool state and return what to do. Callers apply the decision
//! while still holding the pool lock, so a submit-triggered scale-up and a
//! tick-triggered scale-down can never interleave.

use crate::pool::config::WorkerPoolConfig;
use crate::pool::stats::{WorkerCounts, WorkerState};
use crate::pool::worker::Worker;
use crate::pool::worker_pool::Shared;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Scaling bounds copied out of the pool configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ScalingController {
    pub(crate) min_workers: usize,
    pub(crate) max_workers: usize,
    pub(crate) cooldown: Duration,
    pub(crate) backlog_threshold: usize,
}

impl ScalingController {
    pub(crate) fn from_config(config: &WorkerPoolConfig) -> Self {
        Self {
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            cooldown: config.scale_down_cooldown,
            backlog_threshold: config.scale_up_backlog_threshold,
        }
    }

    /// A fixed-size pool never needs the tick task
    pub(crate) fn is_inert(&self) -> bool {
        self.min_workers == self.max_workers
    }

    /// Queued tasks that no idle worker is about to pick up
    pub(crate) fn backlog(counts: WorkerCounts, queue_len: usize) -> usize {
        queue_len.saturating_sub(counts.idle)
    }

    /// Whether one more worker should be spawned
    ///
    /// `arena_len` includes retiring workers that have not exited yet, so
    /// the ceiling holds even while a retirement is in flight.
    pub(crate) fn should_scale_up(
        &self,
        counts: WorkerCounts,
        arena_len: usize,
        queue_len: usize,
    ) -> bool {
        arena_len < self.max_workers
            && Self::backlog(counts, queue_len) >= self.backlog_threshold
    }

    /// Pick the idle worker to retire, if any
    ///
    /// Only when the queue is empty and the live worker count is above the
    /// minimum. The candidate is the worker idle the longest (lowest id on
    /// ties), and it must have been idle for at least the cooldown.
    pub(crate) fn select_retiree(
        &self,
        workers: impl Iterator<Item = (usize, WorkerState, Instant)>,
        counts: WorkerCounts,
        queue_len: usize,
        now: Instant,
    ) -> Option<usize> {
        if queue_len > 0 || counts.idle == 0 || counts.busy + counts.idle <= self.min_workers {
            return None;
        }

        workers
            .filter(|(_, state, _)| *state == WorkerState::Idle)
            .min_by_key(|(id, _, idle_since)| (*idle_since, *id))
            .filter(|(_, _, idle_since)| now.saturating_duration_since(*idle_since) >= self.cooldown)
            .map(|(id, _, _)| id)
    }
}

/// Controller loop: one evaluation per cooldown period until shutdown
pub(crate) async fn run(shared: Arc<Shared>) {
    let period = shared.scaling.cooldown;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shared.controller_stop.notified() => break,
        }

        if !evaluate(&shared) {
            break;
        }
    }

    debug!("[{}] scaling controller stopped", shared.config.pool_name);
}

/// Apply at most one scaling step; returns false once the pool stopped running
fn evaluate(shared: &Arc<Shared>) -> bool {
    let mut state = shared.state.lock();
    if !state.is_running() {
        return false;
    }
    state.prune_finished_handles();

    let counts = state.counts();
    let queue_len = state.queue.len();

    if shared
        .scaling
        .should_scale_up(counts, state.arena_len(), queue_len)
    {
        let worker_id = Worker::spawn(shared, &mut state);
        let live = state.arena_len();
        drop(state);

        info!(
            "[{}] scaled up: worker {} spawned for backlog of {} ({} workers)",
            shared.config.pool_name,
            worker_id,
            ScalingController::backlog(counts, queue_len),
            live
        );
        #[cfg(feature = "tracing")]
        crate::telemetry::record_scale_up(worker_id, live);
        return true;
    }

    let retiree =
        shared
            .scaling
            .select_retiree(state.worker_states(), counts, queue_len, Instant::now());
    let Some(worker_id) = retiree else {
        return true;
    };
    let Some(signal) = state.retire(worker_id) else {
        return true;
    };
    let remaining = state.counts();
    let live = remaining.busy + remaining.idle;
    drop(state);

    signal.notify_one();
    info!(
        "[{}] scaled down: worker {} retired after idling ({} workers)",
        shared.config.pool_name, worker_id, live
    );
    #[cfg(feature = "tracing")]
    crate::telemetry::record_scale_down(worker_id, live);
    true
}
