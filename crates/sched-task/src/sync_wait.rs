//! Bridge from a coroutine task back to blocking, synchronous code
//!
//! `sync_wait_result` is for code that has no coroutine of its own to
//! suspend — typically `main`, or a worker thread driving a chain of
//! tasks one of which needs to wait for the result of another. Blocking
//! a worker thread outright would starve its own group's pool (or, with
//! one worker, deadlock entirely), so a caller running on a worker
//! doesn't just wait on a condition variable: it calls `busy_work`
//! between checks, making progress on someone else's work — possibly
//! its own continuation — while it waits.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use sched_runtime::current_worker;

use crate::task::CoTask;

/// Re-check interval for a worker-thread waiter between `busy_work`
/// attempts, and the condvar timeout for an external-thread waiter.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Block the calling thread until `task` resolves, returning its
/// result.
///
/// Safe to call from a worker thread: it busy-polls the scheduler
/// instead of parking outright, so the calling worker keeps draining
/// its own inboxes — including, potentially, the very continuation that
/// would resolve `task` — instead of deadlocking against itself.
pub fn sync_wait_result<R: Send + 'static>(task: CoTask<R>) -> R {
    let signal = Arc::new((Mutex::new(None::<R>), Condvar::new()));
    let signal2 = Arc::clone(&signal);
    let scheduler = task.scheduler_handle();

    task.on_complete(move |value| {
        let (lock, cvar) = &*signal2;
        *lock.lock().unwrap() = Some(value);
        cvar.notify_all();
    });

    let worker = current_worker();
    let on_worker = worker.is_addressable();
    let (lock, cvar) = &*signal;

    loop {
        let mut guard = lock.lock().unwrap();
        if let Some(value) = guard.take() {
            return value;
        }

        if on_worker {
            drop(guard);
            if !scheduler.busy_work(worker) {
                std::thread::sleep(POLL_INTERVAL);
            }
        } else {
            let (mut guard, _timeout) = cvar.wait_timeout(guard, POLL_INTERVAL).unwrap();
            if let Some(value) = guard.take() {
                return value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_runtime::{Scheduler, SchedulerConfig};

    #[test]
    fn resolves_from_external_thread() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(2)).unwrap();
        let group = sched.create_group(0, 2, 1, "test").unwrap();
        sched.begin_execution().unwrap();

        let task = CoTask::spawn(&sched, group, async { 42 });
        let result = sync_wait_result(task);
        assert_eq!(result, 42);

        sched.end_execution();
    }

    #[test]
    fn resolves_from_single_worker_without_deadlock() {
        // Regression guard: with exactly one worker, a naive blocking
        // wait on that worker's own thread would deadlock forever since
        // no other thread exists to run the continuation.
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(1)).unwrap();
        let group = sched.create_group(0, 1, 1, "test").unwrap();
        sched.begin_execution().unwrap();

        let task = CoTask::spawn(&sched, group, async { 1 + 1 });
        let result = sync_wait_result(task);
        assert_eq!(result, 2);

        sched.end_execution();
    }
}
