//! A simple asynchronous task executor driven by the virtual clock.

use super::{Task, TaskResult};
use crate::time::Clock;
use alloc::{collections::BTreeMap, sync::Arc};
use core::{
    sync::atomic::{AtomicBool, Ordering},
    task::{Context, Poll, Waker},
};
use crossbeam_queue::ArrayQueue;
use futures_util::task::ArcWake;
use ledsem_common::{SpawnError, TaskId};

/// Maximum number of live tasks, and capacity of each ready queue.
pub const MAX_TASKS: usize = 64;

/// A fixed-priority executor over a virtual clock.
///
/// The highest-priority ready task always runs next; tasks of equal priority
/// run in the order they became ready. Time only advances in
/// [`Executor::run_for`], and only once no task is ready.
pub struct Executor {
    clock: Clock,
    tasks: BTreeMap<TaskId, Task>,
    task_queues: [Arc<ArrayQueue<TaskId>>; 4],
    waker_cache: BTreeMap<TaskId, CachedWaker>,
    exits: BTreeMap<TaskId, TaskResult>,
}

struct CachedWaker {
    task_waker: Arc<TaskWaker>,
    waker: Waker,
}

impl Executor {
    /// Create a new executor on `clock`.
    pub fn new(clock: Clock) -> Self {
        Executor {
            clock,
            tasks: BTreeMap::new(),
            task_queues: [
                Arc::new(ArrayQueue::new(MAX_TASKS)), // Idle
                Arc::new(ArrayQueue::new(MAX_TASKS)), // Normal
                Arc::new(ArrayQueue::new(MAX_TASKS)), // High
                Arc::new(ArrayQueue::new(MAX_TASKS)), // Critical
            ],
            waker_cache: BTreeMap::new(),
            exits: BTreeMap::new(),
        }
    }

    /// The clock this executor advances.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Spawn a new task on the executor. It becomes ready immediately.
    pub fn spawn(&mut self, task: Task) -> Result<TaskId, SpawnError> {
        if self.tasks.len() >= MAX_TASKS {
            return Err(SpawnError::QueueFull);
        }

        let task_id = task.id;
        let config = task.config;
        let task_waker = Arc::new(TaskWaker {
            task_id,
            task_queue: self.task_queues[config.priority as usize].clone(),
            queued: AtomicBool::new(false),
        });
        let waker = futures_util::task::waker(task_waker.clone());
        waker.wake_by_ref();

        self.tasks.insert(task_id, task);
        self.waker_cache.insert(task_id, CachedWaker { task_waker, waker });

        log::debug!(
            "spawned {} ({}) priority {:?}, stack hint {} bytes",
            config.name,
            task_id,
            config.priority,
            config.stack_size
        );
        Ok(task_id)
    }

    /// Number of tasks that have not finished.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether `task_id` has run to completion.
    pub fn is_finished(&self, task_id: TaskId) -> bool {
        self.exits.contains_key(&task_id)
    }

    /// How `task_id` ended, or `None` while it is still alive.
    pub fn exit_status(&self, task_id: TaskId) -> Option<&TaskResult> {
        self.exits.get(&task_id)
    }

    /// Poll ready tasks until none is ready, without advancing time.
    ///
    /// A task that keeps waking itself keeps this loop busy; periodic
    /// tasks must sleep on the clock instead.
    pub fn run_until_idle(&mut self) {
        while let Some(task_id) = self.next_ready() {
            self.poll_task(task_id);
        }
    }

    /// Run for `ticks` of virtual time.
    ///
    /// Between timer deadlines every ready task runs to its next suspension
    /// point; then the clock jumps to the next deadline. Ends with the clock
    /// exactly `ticks` later.
    pub fn run_for(&mut self, ticks: u64) {
        let limit = self.clock.now().saturating_add(ticks);
        loop {
            self.run_until_idle();
            match self.clock.next_deadline() {
                Some(deadline) if deadline <= limit => {
                    self.clock.advance_to(deadline);
                }
                _ => break,
            }
        }
        self.clock.advance_to(limit);
        self.run_until_idle();
    }

    /// Pop the next ready task, highest priority first.
    fn next_ready(&self) -> Option<TaskId> {
        self.task_queues.iter().rev().find_map(|queue| queue.pop())
    }

    fn poll_task(&mut self, task_id: TaskId) {
        let task = match self.tasks.get_mut(&task_id) {
            Some(task) => task,
            None => return, // task no longer exists
        };
        let cached = match self.waker_cache.get(&task_id) {
            Some(cached) => cached,
            None => return,
        };

        // Wakes from here on queue the task again
        cached.task_waker.queued.store(false, Ordering::Release);

        let mut context = Context::from_waker(&cached.waker);
        if let Poll::Ready(result) = task.poll(&mut context) {
            let name = task.config.name;
            match &result {
                Ok(()) => log::info!("{} ({}) finished", name, task_id),
                Err(err) => log::error!("{} ({}) halted: {}", name, task_id, err),
            }
            // task done -> remove it and its cached waker
            self.tasks.remove(&task_id);
            self.waker_cache.remove(&task_id);
            self.exits.insert(task_id, result);
        }
    }
}

struct TaskWaker {
    task_id: TaskId,
    task_queue: Arc<ArrayQueue<TaskId>>,
    /// Set while the id sits in the ready queue, so repeated wakes queue it
    /// once.
    queued: AtomicBool,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if arc_self.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        // Each task is queued at most once and live tasks are capped at
        // the queue capacity, so this push cannot fail.
        if arc_self.task_queue.push(arc_self.task_id).is_err() {
            arc_self.queued.store(false, Ordering::Release);
            log::error!("ready queue full, wake of {} lost", arc_self.task_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{yield_now, Priority, TaskConfig};
    use alloc::{rc::Rc, vec::Vec};
    use core::cell::RefCell;
    use ledsem_common::SyncError;

    fn recorder() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_equal_priority_runs_in_spawn_order() {
        let mut executor = Executor::new(Clock::new());
        let order = recorder();
        for name in ["first", "second", "third"] {
            let order = order.clone();
            executor
                .spawn(Task::with_config(TaskConfig::new(name), move |_| async move {
                    order.borrow_mut().push(name);
                    Ok(())
                }))
                .expect("spawn");
        }

        executor.run_until_idle();
        assert_eq!(*order.borrow(), ["first", "second", "third"]);
        assert_eq!(executor.task_count(), 0);
    }

    #[test]
    fn test_higher_priority_runs_first() {
        let mut executor = Executor::new(Clock::new());
        let order = recorder();
        let specs = [
            ("idle", Priority::Idle),
            ("normal", Priority::Normal),
            ("critical", Priority::Critical),
        ];
        for (name, priority) in specs {
            let order = order.clone();
            let config = TaskConfig::new(name).with_priority(priority);
            executor
                .spawn(Task::with_config(config, move |_| async move {
                    order.borrow_mut().push(name);
                    Ok(())
                }))
                .expect("spawn");
        }

        executor.run_until_idle();
        assert_eq!(*order.borrow(), ["critical", "normal", "idle"]);
    }

    #[test]
    fn test_yielding_tasks_interleave() {
        let mut executor = Executor::new(Clock::new());
        let order = recorder();
        for name in ["a", "b"] {
            let order = order.clone();
            executor
                .spawn(Task::with_config(TaskConfig::new(name), move |_| async move {
                    for _ in 0..2 {
                        order.borrow_mut().push(name);
                        yield_now().await;
                    }
                    Ok(())
                }))
                .expect("spawn");
        }

        executor.run_until_idle();
        assert_eq!(*order.borrow(), ["a", "b", "a", "b"]);
    }

    #[test]
    fn test_run_for_advances_clock_through_timers() {
        let clock = Clock::new();
        let mut executor = Executor::new(clock.clone());
        let woke_at = Rc::new(RefCell::new(Vec::new()));
        {
            let clock = clock.clone();
            let woke_at = woke_at.clone();
            executor
                .spawn(Task::new(async move {
                    for _ in 0..3 {
                        clock.sleep(100).await;
                        woke_at.borrow_mut().push(clock.now());
                    }
                    Ok(())
                }))
                .expect("spawn");
        }

        executor.run_for(250);
        assert_eq!(*woke_at.borrow(), [100, 200]);
        assert_eq!(clock.now(), 250);

        executor.run_for(50);
        assert_eq!(*woke_at.borrow(), [100, 200, 300]);
        assert_eq!(executor.task_count(), 0);
    }

    #[test]
    fn test_exit_status_is_recorded() {
        let mut executor = Executor::new(Clock::new());
        let ok = executor.spawn(Task::new(async { Ok(()) })).expect("spawn");
        let failed = executor
            .spawn(Task::new(async { Err(SyncError::ResourceFault) }))
            .expect("spawn");

        assert!(!executor.is_finished(ok));
        executor.run_until_idle();

        assert_eq!(executor.exit_status(ok), Some(&Ok(())));
        assert_eq!(executor.exit_status(failed), Some(&Err(SyncError::ResourceFault)));
    }

    #[test]
    fn test_spawn_rejects_tasks_beyond_capacity() {
        let clock = Clock::new();
        let mut executor = Executor::new(clock.clone());
        for _ in 0..MAX_TASKS {
            let clock = clock.clone();
            executor
                .spawn(Task::new(async move {
                    clock.sleep(10).await;
                    Ok(())
                }))
                .expect("spawn");
        }

        assert_eq!(
            executor.spawn(Task::new(async { Ok(()) })).map(|_| ()),
            Err(SpawnError::QueueFull)
        );
        executor.run_for(10);
        assert_eq!(executor.task_count(), 0);
    }
}
