//! Tracing integration for observability.
//!
//! Enabled by the `tracing` feature. Workers wrap every execution in a
//! `task_execution` span, and the functions below emit metric-style events
//! (`counter.*`, `gauge.*`, `histogram.*` fields) that a subscriber such as
//! `tracing-opentelemetry` can turn into real metrics.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_worker_pool::prelude::*;
//! use tracing::info_span;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new(1, 8))?;
//!
//! let span = info_span!("refresh_market", exchange = "NEPSE");
//! let _guard = span.enter();
//! // The task runs inside `refresh_market`, whichever worker picks it up
//! let handle = pool.submit_traced(FetchIndex::new("NEPSE"))?;
//! ```

use crate::core::{Task, TaskError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::Duration;
use tracing::Instrument;

/// A task wrapper that runs the inner task inside a captured span.
///
/// The current span is captured when the wrapper is created, i.e. on the
/// submitting side, and entered for the whole execution on the worker.
pub struct TracedTask<T: Task> {
    inner: T,
    span: tracing::Span,
}

impl<T: Task> TracedTask<T> {
    /// Wrap `task`, capturing the current span.
    pub fn new(task: T) -> Self {
        Self {
            inner: task,
            span: tracing::Span::current(),
        }
    }

    /// Wrap `task` with an explicit span.
    pub fn with_span(task: T, span: tracing::Span) -> Self {
        Self { inner: task, span }
    }
}

impl<T: Task> Task for TracedTask<T> {
    type Output = T::Output;

    fn run(self) -> BoxFuture<'static, Result<T::Output, TaskError>> {
        let span = self.span;
        let inner = span.in_scope(|| self.inner.run());
        inner.instrument(span).boxed()
    }

    fn task_type(&self) -> &str {
        self.inner.task_type()
    }
}

/// Records a task submission.
#[inline]
pub fn record_submission(queue_depth: usize) {
    tracing::trace!(
        counter.tasks_submitted = 1,
        gauge.queue_depth = queue_depth as i64,
        "task submitted"
    );
}

/// Records a finished task with its execution time.
#[inline]
pub fn record_completion(duration: Duration, success: bool) {
    let duration_ms = duration.as_millis() as u64;
    if success {
        tracing::trace!(
            counter.tasks_completed = 1,
            histogram.task_duration_ms = duration_ms,
            "task completed"
        );
    } else {
        tracing::trace!(
            counter.tasks_failed = 1,
            histogram.task_duration_ms = duration_ms,
            "task failed"
        );
    }
}

/// Records a task panic.
#[inline]
pub fn record_panic(duration: Duration) {
    tracing::trace!(
        counter.tasks_panicked = 1,
        histogram.task_duration_ms = duration.as_millis() as u64,
        "task panicked"
    );
}

/// Records a worker picking up a task.
#[inline]
pub fn record_worker_busy(worker_id: usize) {
    tracing::trace!(gauge.workers_busy = 1, worker_id = worker_id, "worker busy");
}

/// Records a worker going back to idle.
#[inline]
pub fn record_worker_idle(worker_id: usize) {
    tracing::trace!(
        gauge.workers_busy = -1i64,
        worker_id = worker_id,
        "worker idle"
    );
}

/// Records a worker added by the scaling controller.
#[inline]
pub fn record_scale_up(worker_id: usize, workers: usize) {
    tracing::debug!(
        counter.scale_ups = 1,
        gauge.workers = workers as i64,
        worker_id = worker_id,
        "worker pool scaled up"
    );
}

/// Records a worker retired by the scaling controller.
#[inline]
pub fn record_scale_down(worker_id: usize, workers: usize) {
    tracing::debug!(
        counter.scale_downs = 1,
        gauge.workers = workers as i64,
        worker_id = worker_id,
        "worker pool scaled down"
    );
}

/// Records pool startup.
#[inline]
pub fn record_pool_start(num_workers: usize, pool_name: &str) {
    tracing::info!(
        workers = num_workers,
        pool_name = pool_name,
        "worker pool started"
    );
}

/// Records pool shutdown.
#[inline]
pub fn record_pool_shutdown(tasks_completed: u64, tasks_failed: u64) {
    tracing::info!(
        tasks_completed = tasks_completed,
        tasks_failed = tasks_failed,
        "worker pool shutdown complete"
    );
}
