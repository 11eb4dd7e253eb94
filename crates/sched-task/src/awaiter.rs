//! Waker that turns a `poll`'s "not ready yet" into a scheduler resubmit
//!
//! The teacher's coroutine switched a stack directly back into the
//! scheduler loop on suspend and back into the coroutine's own stack on
//! resume. A `Future`-based task has no stack to switch: suspending
//! means returning `Poll::Pending`, and resuming means polling again.
//! This waker is what rebuilds the "resume" half: `wake()` packs another
//! poll of the same task as a `WorkItem` and resubmits it to the
//! workgroup the task was spawned on, so the scheduler — not the
//! original caller — drives the task forward.

use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

use sched_core::WorkgroupId;
use sched_runtime::{current_worker, Scheduler, WorkItem};

/// Anything that can be polled again. `Arc<TaskInner<R>>` implements
/// this indirectly through `task::poll_once`; kept as a trait so the
/// waker doesn't need to be generic over `R`.
pub trait Resumable: Send + Sync {
    fn resume(self: Arc<Self>);
}

pub fn make_waker<T: Resumable + 'static>(
    target: Arc<T>,
    scheduler: Scheduler,
    group: WorkgroupId,
) -> Waker {
    let driver = Arc::new(Driver {
        target,
        scheduler,
        group,
    });
    let raw = RawWaker::new(Arc::into_raw(driver) as *const (), vtable::<T>());
    unsafe { Waker::from_raw(raw) }
}

struct Driver<T: Resumable + 'static> {
    target: Arc<T>,
    scheduler: Scheduler,
    group: WorkgroupId,
}

unsafe fn clone_raw<T: Resumable + 'static>(ptr: *const ()) -> RawWaker {
    let driver = ptr as *const Driver<T>;
    Arc::increment_strong_count(driver);
    RawWaker::new(ptr, vtable::<T>())
}

unsafe fn wake_raw<T: Resumable + 'static>(ptr: *const ()) {
    let driver = Arc::from_raw(ptr as *const Driver<T>);
    submit_resume(&driver);
}

unsafe fn wake_by_ref_raw<T: Resumable + 'static>(ptr: *const ()) {
    let driver = &*(ptr as *const Driver<T>);
    submit_resume(driver);
}

unsafe fn drop_raw<T: Resumable + 'static>(ptr: *const ()) {
    drop(Arc::from_raw(ptr as *const Driver<T>));
}

fn submit_resume<T: Resumable + 'static>(driver: &Driver<T>) {
    let target = Arc::clone(&driver.target);
    let _ = driver.scheduler.submit(
        current_worker(),
        driver.group,
        WorkItem::pack(move || {
            target.resume();
        }),
    );
}

fn vtable<T: Resumable + 'static>() -> &'static RawWakerVTable {
    // Monomorphized per `T`; each instantiation gets its own static
    // thanks to rvalue static promotion of this const expression.
    &RawWakerVTable::new(clone_raw::<T>, wake_raw::<T>, wake_by_ref_raw::<T>, drop_raw::<T>)
}
