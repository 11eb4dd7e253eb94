//! Thread-local "adopted scheduler" handle
//!
//! `take_ownership` is a convenience for call sites that want to reach
//! the scheduler without threading a handle through every function —
//! typically a worker's own work-item body, or an external thread that
//! wants `sync_wait_result` to busy-poll instead of blocking. It is not
//! how the scheduler discovers its own handle internally; every
//! `Scheduler` method already has `self`.

use std::cell::RefCell;

use crate::scheduler::Scheduler;

thread_local! {
    static OWNED: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

/// Stash a clone of `scheduler` in this thread's local storage so that
/// later code on the same thread can call `current()` without a handle
/// in scope.
pub fn take_ownership(scheduler: &Scheduler) {
    OWNED.with(|cell| *cell.borrow_mut() = Some(scheduler.clone()));
}

/// Drop this thread's adopted scheduler, if any.
pub fn release_ownership() {
    OWNED.with(|cell| *cell.borrow_mut() = None);
}

/// The scheduler this thread adopted via `take_ownership`, if any.
pub fn current() -> Option<Scheduler> {
    OWNED.with(|cell| cell.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;

    #[test]
    fn round_trips() {
        assert!(current().is_none());
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(1)).unwrap();
        take_ownership(&sched);
        assert!(current().is_some());
        release_ownership();
        assert!(current().is_none());
    }
}
