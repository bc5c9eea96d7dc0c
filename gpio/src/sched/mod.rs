//! Cooperative scheduler interface.
//!
//! Every task posted to a [Scheduler] runs to completion on a single execution context,
//! one after another. The dial pad relies on that to mutate its state without locks.

use std::fmt::Debug;
use std::num::NonZero;
use std::time::Duration;

/// A unit of work posted to a [Scheduler].
pub type Task = Box<dyn FnOnce()>;

/// Opaque handle to a posted task, used to cancel it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskHandle(NonZero<u64>);

impl TaskHandle {
    /// Creates a handle from a raw, non-zero id.
    pub fn from_raw(id: u64) -> Option<Self> {
        NonZero::new(id).map(TaskHandle)
    }

    /// Gets the raw id of the handle.
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

pub trait Scheduler: Debug {
    /// Posts a task to run as soon as possible.
    fn post(&self, task: Task) -> TaskHandle;

    /// Posts a task to run after `delay`.
    ///
    /// The scheduler may run it anywhere within `delay..=delay + tolerance`, which lets it
    /// coalesce wake-ups.
    fn post_delayed(&self, task: Task, delay: Duration, tolerance: Duration) -> TaskHandle;

    /// Cancels a task that has not run yet.
    ///
    /// Cancelling a task that already ran or was already cancelled does nothing.
    fn cancel(&self, handle: TaskHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_rejects_zero() {
        assert_eq!(TaskHandle::from_raw(0), None);
        assert_eq!(TaskHandle::from_raw(7).map(|h| h.get()), Some(7));
    }
}
