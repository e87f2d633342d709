//! Task trait and related types

use crate::core::error::{PoolError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::oneshot;

/// Error type a task may fail with
///
/// Anything convertible into a boxed error works: `String`, `&str`,
/// `std::io::Error`, `anyhow::Error`, or [`PoolError`] itself.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A trait representing an asynchronous unit of work executed by the pool
///
/// The pool never inspects what a task computes. It only drives the future
/// returned by [`run`](Task::run) to completion on one of its workers and
/// hands the output back to the submitter.
pub trait Task: Send + 'static {
    /// Value produced on success
    type Output: Send + 'static;

    /// Consume the task and produce the future that performs the work
    fn run(self) -> BoxFuture<'static, std::result::Result<Self::Output, TaskError>>;

    /// Get the task's type name for logging and statistics
    fn task_type(&self) -> &str {
        "Task"
    }
}

/// Helper to create a task from an async closure
pub struct ClosureTask<F> {
    closure: F,
    name: String,
}

impl<F> ClosureTask<F> {
    /// Create a new closure task
    pub fn new(closure: F) -> Self {
        Self {
            closure,
            name: "ClosureTask".to_string(),
        }
    }

    /// Create a new closure task with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure,
            name: name.into(),
        }
    }
}

impl<F> fmt::Debug for ClosureTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClosureTask({})", self.name)
    }
}

impl<F, Fut, T, E> Task for ClosureTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<TaskError> + 'static,
{
    type Output = T;

    fn run(self) -> BoxFuture<'static, std::result::Result<T, TaskError>> {
        let closure = self.closure;
        async move { closure().await.map_err(Into::into) }.boxed()
    }

    fn task_type(&self) -> &str {
        &self.name
    }
}

/// How a single task execution ended, as seen by the worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    Succeeded,
    Failed,
    Panicked,
}

/// A finished execution whose result has not been handed to the caller yet
///
/// Workers record the outcome in the pool statistics before calling
/// [`deliver`](Completion::deliver), so a caller that observes the result
/// also observes the updated counters.
pub(crate) struct Completion {
    pub(crate) outcome: TaskOutcome,
    /// Error text for failed or panicked executions
    pub(crate) failure: Option<String>,
    deliver: Box<dyn FnOnce() + Send>,
}

impl Completion {
    pub(crate) fn deliver(self) {
        (self.deliver)()
    }
}

/// Type-erased task paired with its result channel
pub(crate) trait ErasedTask: Send {
    /// Execute the task with panic protection
    fn run(self: Box<Self>, task_id: u64) -> BoxFuture<'static, Completion>;

    /// Resolve the caller's handle with `error` without running the task
    fn cancel(self: Box<Self>, error: PoolError);
}

/// A boxed task ready to be queued
pub(crate) type BoxedTask = Box<dyn ErasedTask>;

struct Envelope<T: Task> {
    task: T,
    result_tx: oneshot::Sender<Result<T::Output>>,
}

impl<T: Task> ErasedTask for Envelope<T> {
    fn run(self: Box<Self>, task_id: u64) -> BoxFuture<'static, Completion> {
        let Envelope { task, result_tx } = *self;
        async move {
            // Building the future and formatting the task's own error both
            // happen inside the guarded block, so a panic in `run` or in the
            // error's `Display` is caught as well.
            let guarded = AssertUnwindSafe(async move {
                match task.run().await {
                    Ok(value) => (TaskOutcome::Succeeded, Ok(value)),
                    Err(e) => (
                        TaskOutcome::Failed,
                        Err(PoolError::task_failure(task_id, e.to_string())),
                    ),
                }
            })
            .catch_unwind();
            let (outcome, result) = match guarded.await {
                Ok(finished) => finished,
                Err(panic_info) => (
                    TaskOutcome::Panicked,
                    Err(PoolError::task_failure(
                        task_id,
                        format!("task panicked: {}", panic_message(&*panic_info)),
                    )),
                ),
            };
            let failure = result.as_ref().err().map(ToString::to_string);
            Completion {
                outcome,
                failure,
                deliver: Box::new(move || {
                    // The caller may have dropped its handle
                    let _ = result_tx.send(result);
                }),
            }
        }
        .boxed()
    }

    fn cancel(self: Box<Self>, error: PoolError) {
        let _ = self.result_tx.send(Err(error));
    }
}

/// Wrap a task and its result sender into a queueable unit
pub(crate) fn erase<T: Task>(task: T, result_tx: oneshot::Sender<Result<T::Output>>) -> BoxedTask {
    Box::new(Envelope { task, result_tx })
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_task() {
        let task = ClosureTask::new(|| async { Ok::<_, TaskError>(7) });

        assert_eq!(task.task_type(), "ClosureTask");
        assert_eq!(task.run().await.expect("task should succeed"), 7);
    }

    #[test]
    fn test_closure_task_with_name() {
        let task = ClosureTask::with_name(|| async { Ok::<_, String>(()) }, "market-summary");
        assert_eq!(task.task_type(), "market-summary");
    }

    #[tokio::test]
    async fn test_envelope_reports_failure() {
        let (tx, rx) = oneshot::channel();
        let task = ClosureTask::new(|| async { Err::<(), _>("upstream timed out") });

        let completion = erase(task, tx).run(9).await;
        assert_eq!(completion.outcome, TaskOutcome::Failed);
        completion.deliver();

        let err = rx.await.expect("result delivered").unwrap_err();
        assert_eq!(
            err,
            PoolError::task_failure(9, "upstream timed out"),
            "failure message should be forwarded"
        );
    }

    #[tokio::test]
    async fn test_envelope_catches_panic() {
        let (tx, rx) = oneshot::channel::<Result<()>>();
        let should_panic = true;
        let task = ClosureTask::new(move || async move {
            if should_panic {
                panic!("Intentional panic for testing");
            }
            Ok::<_, TaskError>(())
        });

        let completion = erase(task, tx).run(1).await;
        assert_eq!(completion.outcome, TaskOutcome::Panicked);
        completion.deliver();

        let err = rx.await.expect("result delivered").unwrap_err();
        assert!(err.to_string().contains("Intentional panic for testing"));
    }

    #[derive(Debug)]
    struct UnprintableError;

    impl fmt::Display for UnprintableError {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("error cannot be displayed")
        }
    }

    impl std::error::Error for UnprintableError {}

    #[tokio::test]
    async fn test_envelope_catches_panicking_error_display() {
        let (tx, rx) = oneshot::channel::<Result<()>>();
        let task = ClosureTask::new(|| async { Err::<(), _>(UnprintableError) });

        let completion = erase(task, tx).run(4).await;
        assert_eq!(completion.outcome, TaskOutcome::Panicked);
        completion.deliver();

        let err = rx.await.expect("result delivered").unwrap_err();
        assert!(err.is_task_failure());
        assert!(err.to_string().contains("error cannot be displayed"));
    }

    #[tokio::test]
    async fn test_envelope_cancel() {
        let (tx, rx) = oneshot::channel();
        let task = ClosureTask::new(|| async { Ok::<_, TaskError>(()) });

        erase(task, tx).cancel(PoolError::cancelled(3, crate::core::CancellationReason::Manual));

        let err = rx.await.expect("result delivered").unwrap_err();
        assert!(err.is_cancelled());
    }
}
