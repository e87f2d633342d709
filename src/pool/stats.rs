//! Pool statistics.
//!
//! [`StatsAggregator`] holds the monotonic counters. It lives inside the
//! pool state and is only mutated by the worker that executed a task, while
//! the pool lock is held, so a [`PoolStats`] snapshot never observes a
//! half-updated set of counters.

use crate::core::task::TaskOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[cfg(feature = "metrics")]
use dashmap::DashMap;

/// Monotonic pool-wide counters
#[derive(Clone, Debug, Default)]
pub(crate) struct StatsAggregator {
    submitted: u64,
    completed: u64,
    errors: u64,
    panics: u64,
    cancelled: u64,
    busy_time: Duration,
}

impl StatsAggregator {
    pub(crate) fn record_submission(&mut self) {
        self.submitted += 1;
    }

    /// Record one finished task; exactly one of completed/errors moves
    pub(crate) fn record_outcome(&mut self, outcome: TaskOutcome, elapsed: Duration) {
        match outcome {
            TaskOutcome::Succeeded => self.completed += 1,
            TaskOutcome::Failed => self.errors += 1,
            TaskOutcome::Panicked => {
                self.errors += 1;
                self.panics += 1;
            }
        }
        self.busy_time += elapsed;
    }

    pub(crate) fn record_cancelled(&mut self, count: usize) {
        self.cancelled += count as u64;
    }

    /// Fill the counter fields of a snapshot
    pub(crate) fn snapshot(&self, workers: WorkerCounts, queue_length: usize) -> PoolStats {
        let finished = self.completed + self.errors;
        PoolStats {
            total_workers: workers.busy + workers.idle,
            busy_workers: workers.busy,
            idle_workers: workers.idle,
            queue_length,
            total_tasks_completed: self.completed,
            total_errors: self.errors,
            total_panics: self.panics,
            total_cancelled: self.cancelled,
            total_submitted: self.submitted,
            total_busy_time_ms: self.busy_time.as_millis() as u64,
            average_task_time_ms: if finished > 0 {
                self.busy_time.as_secs_f64() * 1000.0 / finished as f64
            } else {
                0.0
            },
            captured_at: Utc::now(),
        }
    }
}

/// Busy/idle split of the live worker set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct WorkerCounts {
    pub(crate) busy: usize,
    pub(crate) idle: usize,
}

/// Point-in-time snapshot of pool utilization
///
/// `total_workers == busy_workers + idle_workers` always holds. Workers that
/// have been told to retire are no longer counted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Live workers
    pub total_workers: usize,
    /// Workers currently executing a task
    pub busy_workers: usize,
    /// Workers waiting for a task
    pub idle_workers: usize,
    /// Tasks waiting in the queue
    pub queue_length: usize,
    /// Tasks that finished successfully
    pub total_tasks_completed: u64,
    /// Tasks that failed, panics included
    pub total_errors: u64,
    /// Tasks that panicked
    pub total_panics: u64,
    /// Tasks removed from the queue before running
    pub total_cancelled: u64,
    /// Tasks accepted by `submit`
    pub total_submitted: u64,
    /// Accumulated execution time of finished tasks
    pub total_busy_time_ms: u64,
    /// Mean execution time of finished tasks
    pub average_task_time_ms: f64,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
}

impl PoolStats {
    /// Tasks that ran to an outcome (success or failure)
    pub fn total_tasks_finished(&self) -> u64 {
        self.total_tasks_completed + self.total_errors
    }

    /// Fraction of live workers currently busy (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.total_workers == 0 {
            0.0
        } else {
            self.busy_workers as f64 / self.total_workers as f64
        }
    }
}

/// Lifecycle state of a worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Waiting for a task
    Idle,
    /// Executing a task
    Busy,
    /// Told to retire; exits without taking new work
    Terminating,
}

/// Per-worker view returned by [`WorkerPool::worker_stats`](crate::WorkerPool::worker_stats)
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    /// Worker id, unique within the pool
    pub id: usize,
    /// Current state
    pub state: WorkerState,
    /// Tasks this worker finished successfully
    pub tasks_completed: u64,
    /// Tasks this worker finished with an error
    pub errors: u64,
    /// How long the worker has been idle, if it is idle
    pub idle_for: Option<Duration>,
}

/// Statistics for a specific task type
#[cfg(feature = "metrics")]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStats {
    /// Tasks of this type accepted by `submit`
    pub submitted: u64,
    /// Tasks that finished successfully
    pub completed: u64,
    /// Tasks that failed, panics included
    pub failed: u64,
    /// Average execution time
    pub avg_latency: Duration,
    /// Maximum execution time observed
    pub max_latency: Duration,
}

#[cfg(feature = "metrics")]
impl TypeStats {
    /// Returns the success rate as a percentage (0.0 to 100.0).
    pub fn success_rate(&self) -> f64 {
        let processed = self.completed + self.failed;
        if processed == 0 {
            100.0
        } else {
            (self.completed as f64 / processed as f64) * 100.0
        }
    }
}

#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
struct TypeCounters {
    stats: TypeStats,
    total_time: Duration,
}

/// Per-task-type counters keyed by [`Task::task_type`](crate::Task::task_type)
#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
pub(crate) struct TypeStatsCollector {
    by_type: DashMap<String, TypeCounters>,
}

/// Mean of `total` over `count` samples, without narrowing the count
#[cfg(feature = "metrics")]
fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(feature = "metrics")]
impl TypeStatsCollector {
    pub(crate) fn record_submission(&self, task_type: &str) {
        self.by_type
            .entry(task_type.to_string())
            .or_default()
            .stats
            .submitted += 1;
    }

    pub(crate) fn record_outcome(&self, task_type: &str, outcome: TaskOutcome, elapsed: Duration) {
        let mut entry = self.by_type.entry(task_type.to_string()).or_default();
        let counters = entry.value_mut();
        match outcome {
            TaskOutcome::Succeeded => counters.stats.completed += 1,
            TaskOutcome::Failed | TaskOutcome::Panicked => counters.stats.failed += 1,
        }
        counters.total_time += elapsed;
        counters.stats.max_latency = counters.stats.max_latency.max(elapsed);
        let finished = counters.stats.completed + counters.stats.failed;
        counters.stats.avg_latency = average(counters.total_time, finished);
    }

    pub(crate) fn snapshot(&self) -> std::collections::HashMap<String, TypeStats> {
        self.by_type
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats.clone()))
            .collect()
    }
}
