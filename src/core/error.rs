//! Error types for the worker pool

use std::fmt;

/// Result type for worker pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Why a queued task was cancelled before any worker claimed it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Cancelled by the caller through [`TaskHandle::cancel`](crate::TaskHandle::cancel)
    Manual,
    /// Discarded by a forced shutdown
    Shutdown,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "cancelled by caller"),
            CancellationReason::Shutdown => write!(f, "discarded by forced shutdown"),
        }
    }
}

/// Errors that can occur in the worker pool
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Submission after shutdown has begun
    #[error("Worker pool '{pool_name}' is closed")]
    PoolClosed {
        /// Name of the worker pool
        pool_name: String,
    },

    /// The task returned an error or panicked while executing
    #[error("Task execution failed (task_id: {task_id}): {message}")]
    TaskFailure {
        /// ID of the failed task
        task_id: u64,
        /// Error message
        message: String,
    },

    /// The task was removed from the queue before it started
    #[error("Task cancelled (task_id: {task_id}): {reason}")]
    Cancelled {
        /// ID of the cancelled task
        task_id: u64,
        /// Reason for cancellation
        reason: CancellationReason,
    },

    /// Queue is full with capacity details
    #[error("Task queue is full: {current}/{max} tasks queued")]
    QueueFull {
        /// Current queue size
        current: usize,
        /// Maximum queue size
        max: usize,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// The pool was built outside of a tokio runtime
    #[error("No tokio runtime available: {message}")]
    RuntimeUnavailable {
        /// Error message from the runtime lookup
        message: String,
    },

    /// The result channel closed without delivering a value
    #[error("Result for task {task_id} was lost before completion")]
    ResultLost {
        /// ID of the task
        task_id: u64,
    },

    /// The process-wide pool has not been initialised
    #[error("Global worker pool is not initialized")]
    GlobalPoolUninitialized,

    /// The process-wide pool is already initialised and running
    #[error("Global worker pool is already initialized")]
    GlobalPoolAlreadyInitialized,

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create a pool closed error
    pub fn pool_closed(pool_name: impl Into<String>) -> Self {
        PoolError::PoolClosed {
            pool_name: pool_name.into(),
        }
    }

    /// Create a task failure error
    pub fn task_failure(task_id: u64, message: impl Into<String>) -> Self {
        PoolError::TaskFailure {
            task_id,
            message: message.into(),
        }
    }

    /// Create a cancelled error
    pub fn cancelled(task_id: u64, reason: CancellationReason) -> Self {
        PoolError::Cancelled { task_id, reason }
    }

    /// Create a queue full error
    pub fn queue_full(current: usize, max: usize) -> Self {
        PoolError::QueueFull { current, max }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a runtime unavailable error
    pub fn runtime_unavailable(message: impl Into<String>) -> Self {
        PoolError::RuntimeUnavailable {
            message: message.into(),
        }
    }

    /// Create a result lost error
    pub fn result_lost(task_id: u64) -> Self {
        PoolError::ResultLost { task_id }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }

    /// Returns true if this error reports a cancelled task
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PoolError::Cancelled { .. })
    }

    /// Returns true if this error reports a failed task
    pub fn is_task_failure(&self) -> bool {
        matches!(self, PoolError::TaskFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PoolError::pool_closed("main_pool");
        assert!(matches!(err, PoolError::PoolClosed { .. }));

        let err = PoolError::queue_full(100, 100);
        assert!(matches!(err, PoolError::QueueFull { .. }));

        let err = PoolError::task_failure(123, "upstream returned 503");
        assert!(err.is_task_failure());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_error_display() {
        let err = PoolError::pool_closed("market_pool");
        assert_eq!(err.to_string(), "Worker pool 'market_pool' is closed");

        let err = PoolError::cancelled(42, CancellationReason::Shutdown);
        assert_eq!(
            err.to_string(),
            "Task cancelled (task_id: 42): discarded by forced shutdown"
        );

        let err = PoolError::invalid_config("min_workers", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'min_workers': must be at least 1"
        );
    }

    #[test]
    fn test_pool_error_is_a_task_error() {
        let boxed: crate::core::TaskError = Box::new(PoolError::other("boom"));
        assert_eq!(boxed.to_string(), "boom");
    }
}
