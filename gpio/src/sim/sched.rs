use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::time::Duration;
use log::trace;
use crate::sched::{Scheduler, Task, TaskHandle};

/// A deterministic [Scheduler] running on simulated time.
///
/// Time only moves when [SimScheduler::advance] is called. Tasks run in the order they are
/// due, ties in the order they were posted. Clones share the same queue.
#[derive(Clone, Default)]
pub struct SimScheduler {
    queue: Rc<RefCell<SimQueue>>,
}

#[derive(Default)]
struct SimQueue {
    now: Duration,
    last_id: u64,
    late_firing: bool,
    tasks: Vec<SimTask>,
}

struct SimTask {
    handle: TaskHandle,
    due: Duration,
    task: Task,
}

impl Debug for SimScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let queue = self.queue.borrow();
        write!(f, "SimScheduler({:?}, {} pending)", queue.now, queue.tasks.len())
    }
}

impl SimScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes delayed tasks run at the end of their tolerance window instead of its start.
    pub fn with_late_firing(self) -> Self {
        self.queue.borrow_mut().late_firing = true;
        self
    }

    /// Gets the simulated time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// Gets the number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.queue.borrow().tasks.iter().any(|task| task.handle == handle)
    }

    /// Runs every task that is due, including the ones they post, without moving time.
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let now = self.now();
        self.run_until(now)
    }

    /// Moves time forward by `by`, running every task that becomes due on the way.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let ran = self.run_until(target);
        self.queue.borrow_mut().now = target;
        ran
    }

    fn run_until(&self, until: Duration) -> usize {
        let mut ran = 0;
        while let Some(task) = self.take_next(until) {
            trace!("Running task {} at {:?}", task.handle.get(), task.due);
            (task.task)();
            ran += 1;
        }
        ran
    }

    fn take_next(&self, until: Duration) -> Option<SimTask> {
        let mut queue = self.queue.borrow_mut();
        let index = queue.tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= until)
            .min_by_key(|(_, task)| (task.due, task.handle.get()))
            .map(|(index, _)| index)?;

        let task = queue.tasks.remove(index);
        if task.due > queue.now {
            queue.now = task.due;
        }
        Some(task)
    }

    fn enqueue(&self, task: Task, delay: Duration) -> TaskHandle {
        let mut queue = self.queue.borrow_mut();
        queue.last_id += 1;
        let handle = TaskHandle::from_raw(queue.last_id).unwrap_or_else(|| unreachable!());
        let due = queue.now + delay;
        queue.tasks.push(SimTask { handle, due, task });
        handle
    }
}

impl Scheduler for SimScheduler {
    fn post(&self, task: Task) -> TaskHandle {
        self.enqueue(task, Duration::ZERO)
    }

    fn post_delayed(&self, task: Task, delay: Duration, tolerance: Duration) -> TaskHandle {
        let late = self.queue.borrow().late_firing;
        self.enqueue(task, if late { delay + tolerance } else { delay })
    }

    fn cancel(&self, handle: TaskHandle) {
        self.queue.borrow_mut().tasks.retain(|task| task.handle != handle);
    }
}
