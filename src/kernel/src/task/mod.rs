//! Asynchronous task management.

use alloc::boxed::Box;
use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use ledsem_common::{SyncError, TaskId};

pub mod executor;
pub mod owner;

/// Stack size hint used when a task does not ask for one, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 1000;

/// What a task body returns when it stops.
pub type TaskResult = Result<(), SyncError>;

/// Yields execution to allow other tasks to run.
///
/// Returns `Pending` once, wakes itself, then returns `Ready`.
pub async fn yield_now() {
    YieldNow { yielded: false }.await
}

struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Lowest priority, runs only when no other tasks are ready.
    Idle = 0,
    /// Standard priority for most tasks.
    Normal = 1,
    /// High priority for latency-sensitive tasks.
    High = 2,
    /// Highest priority for critical system tasks.
    Critical = 3,
}

/// Registration parameters of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// Human-readable name used in logs.
    pub name: &'static str,
    /// Stack size hint in bytes. Futures carry their own state, so this is
    /// recorded for reporting only.
    pub stack_size: usize,
    /// Scheduling priority.
    pub priority: Priority,
}

impl TaskConfig {
    /// A `Normal` priority task with the default stack hint.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            stack_size: DEFAULT_STACK_SIZE,
            priority: Priority::Normal,
        }
    }

    /// Set the priority.
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the stack size hint.
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

/// A wrapper around a future that represents a task.
pub struct Task {
    id: TaskId,
    config: TaskConfig,
    future: Pin<Box<dyn Future<Output = TaskResult>>>,
}

impl Task {
    /// Create a new anonymous task from a future with Normal priority.
    pub fn new(future: impl Future<Output = TaskResult> + 'static) -> Task {
        Self::with_config(TaskConfig::new("anonymous"), |_| future)
    }

    /// Create a task from a body that receives the task's own id.
    ///
    /// The id is what the task presents to the token, so the body needs it
    /// before the task is spawned.
    pub fn with_config<F, B>(config: TaskConfig, body: B) -> Task
    where
        B: FnOnce(TaskId) -> F,
        F: Future<Output = TaskResult> + 'static,
    {
        let id = TaskId::next();
        Task {
            id,
            config,
            future: Box::pin(body(id)),
        }
    }

    /// The task's id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The task's registration parameters.
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Poll the task's future.
    fn poll(&mut self, context: &mut Context) -> Poll<TaskResult> {
        self.future.as_mut().poll(context)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_receives_task_id() {
        let mut seen = None;
        let task = Task::with_config(TaskConfig::new("probe"), |id| {
            seen = Some(id);
            async { Ok(()) }
        });
        assert_eq!(seen, Some(task.id()));
        assert_eq!(task.config().name, "probe");
        assert_eq!(task.config().stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(task.config().priority, Priority::Normal);
    }

    #[test]
    fn test_config_builders() {
        let config = TaskConfig::new("fast")
            .with_priority(Priority::High)
            .with_stack_size(4096);
        assert_eq!(config.priority, Priority::High);
        assert_eq!(config.stack_size, 4096);
    }
}
