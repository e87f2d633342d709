//! FIFO task queue shared by all workers of a pool.
//!
//! The queue is a plain [`VecDeque`] that lives inside the pool state and is
//! only touched while the pool lock is held, so worker state transitions and
//! queue mutations are observed together by statistics snapshots.
//!
//! Insertion order is execution order; there is no priority scheduling.
//! Depth is unbounded unless a `max_queue_size` is configured, in which case
//! [`TaskQueue::push`] rejects work with [`PoolError::QueueFull`].

use crate::core::task::BoxedTask;
use crate::core::{PoolError, Result};
use std::collections::VecDeque;
use tokio::time::Instant;

/// A task waiting in the queue together with its bookkeeping
pub(crate) struct QueuedTask {
    /// Submission sequence number, strictly increasing per pool
    pub(crate) id: u64,
    /// Name reported by [`Task::task_type`](crate::Task::task_type)
    pub(crate) task_type: String,
    pub(crate) enqueued_at: Instant,
    pub(crate) task: BoxedTask,
}

impl QueuedTask {
    pub(crate) fn new(id: u64, task_type: impl Into<String>, task: BoxedTask) -> Self {
        Self {
            id,
            task_type: task_type.into(),
            enqueued_at: Instant::now(),
            task,
        }
    }

    /// Resolve the submitter's handle with `error` instead of running
    pub(crate) fn cancel(self, error: PoolError) {
        self.task.cancel(error);
    }
}

impl std::fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedTask")
            .field("id", &self.id)
            .field("task_type", &self.task_type)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

/// Ordered buffer of pending tasks
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<QueuedTask>,
    /// 0 = unbounded
    max_size: usize,
}

impl TaskQueue {
    /// Create a queue; `max_size == 0` means unbounded
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            tasks: VecDeque::new(),
            max_size,
        }
    }

    /// Append a task at the back of the queue
    pub(crate) fn push(&mut self, task: QueuedTask) -> Result<()> {
        if self.max_size > 0 && self.tasks.len() >= self.max_size {
            return Err(PoolError::queue_full(self.tasks.len(), self.max_size));
        }
        debug_assert!(
            self.tasks.back().map_or(true, |last| last.id < task.id),
            "task ids must be pushed in submission order"
        );
        self.tasks.push_back(task);
        Ok(())
    }

    /// Take the oldest task
    pub(crate) fn pop(&mut self) -> Option<QueuedTask> {
        self.tasks.pop_front()
    }

    /// Remove a specific task that no worker has claimed yet
    pub(crate) fn remove(&mut self, id: u64) -> Option<QueuedTask> {
        // Ids are pushed in increasing order, so the deque stays sorted.
        let index = self.tasks.binary_search_by_key(&id, |t| t.id).ok()?;
        self.tasks.remove(index)
    }

    /// Remove every pending task, oldest first
    pub(crate) fn drain(&mut self) -> Vec<QueuedTask> {
        self.tasks.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Maximum depth, `None` when unbounded
    pub(crate) fn capacity(&self) -> Option<usize> {
        (self.max_size > 0).then_some(self.max_size)
    }
}
