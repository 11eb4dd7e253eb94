//! Coroutine tasks
//!
//! `CoTask<R>` wraps a `Future<Output = R>` and drives it to completion
//! on a scheduler's workgroup. Suspending (`Poll::Pending`) and resuming
//! (a wake) are both expressed as work-item submissions: the task's
//! continuation is "poll me again", submitted by the waker in
//! `awaiter.rs` rather than switched to directly, the way the original
//! stackful coroutines did.
//!
//! `CoTask` is built suspended: the first poll happens on the
//! scheduler, not on the calling thread. `CoSequence` is built eager: it
//! runs synchronously on the constructing thread up to its first
//! suspension point, matching a hand-written state machine's natural
//! behavior of doing as much work as possible before yielding.
//!
//! A task has a single wait point: at most one `.await`, one
//! `on_complete` continuation, or one `sync_wait_result` call observes
//! its result. Installing a second consumer after the first is a bug in
//! the caller, not a race the task needs to arbitrate — debug builds
//! assert it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use sched_core::{SpinLock, WorkgroupId};
use sched_runtime::Scheduler;

use crate::awaiter::{make_waker, Resumable};

type BoxFuture<R> = Pin<Box<dyn Future<Output = R> + Send>>;

enum Slot<R> {
    Pending(BoxFuture<R>),
    Polling,
    Ready(R),
    Taken,
}

/// The task's single consumer: either another task `.await`ing it (a
/// `Waker` to re-poll with), or a plain callback (`sync_wait_result` or
/// `CoTask::on_complete`) that wants the value handed to it directly.
enum Waiter<R> {
    Poll(std::task::Waker),
    Callback(Box<dyn FnOnce(R) + Send>),
}

pub(crate) struct TaskInner<R> {
    scheduler: Scheduler,
    group: WorkgroupId,
    slot: SpinLock<Slot<R>>,
    waiter: SpinLock<Option<Waiter<R>>>,
    /// Set when a wake arrives while the future is already being polled
    /// (the wake race classic to hand-rolled executors): `poll_once`
    /// checks this after it finishes and re-polls immediately instead
    /// of losing the wakeup.
    rewake_requested: AtomicBool,
}

impl<R: Send + 'static> Resumable for TaskInner<R> {
    fn resume(self: Arc<Self>) {
        poll_once(&self);
    }
}

fn poll_once<R: Send + 'static>(inner: &Arc<TaskInner<R>>) {
    let mut fut = {
        let mut slot = inner.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Polling) {
            Slot::Pending(fut) => fut,
            Slot::Polling => {
                // Another resume is already driving this future; ask it
                // to re-poll once more when it's done instead of
                // polling concurrently ourselves.
                inner.rewake_requested.store(true, Ordering::Release);
                return;
            }
            other => {
                // Already resolved or already consumed: nothing to do.
                *slot = other;
                return;
            }
        }
    };

    let waker = make_waker(Arc::clone(inner), inner.scheduler.clone(), inner.group);
    let mut cx = Context::from_waker(&waker);

    match fut.as_mut().poll(&mut cx) {
        Poll::Ready(value) => {
            match inner.waiter.lock().take() {
                Some(Waiter::Callback(cb)) => {
                    *inner.slot.lock() = Slot::Taken;
                    cb(value);
                }
                Some(Waiter::Poll(waker)) => {
                    *inner.slot.lock() = Slot::Ready(value);
                    waker.wake();
                }
                None => {
                    *inner.slot.lock() = Slot::Ready(value);
                }
            }
        }
        Poll::Pending => {
            *inner.slot.lock() = Slot::Pending(fut);
            if inner.rewake_requested.swap(false, Ordering::AcqRel) {
                poll_once(inner);
            }
        }
    }
}

/// A handle to a spawned coroutine task. Implements `Future` so it can
/// itself be `.await`ed from another task running on the same
/// scheduler.
pub struct CoTask<R: Send + 'static> {
    inner: Arc<TaskInner<R>>,
}

impl<R: Send + 'static> Clone for CoTask<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Send + 'static> CoTask<R> {
    /// Spawn `fut` on `scheduler`, targeting `group`. The first poll is
    /// itself submitted as a work item, so construction never runs user
    /// code on the calling thread.
    pub fn spawn(
        scheduler: &Scheduler,
        group: WorkgroupId,
        fut: impl Future<Output = R> + Send + 'static,
    ) -> Self {
        let inner = Arc::new(TaskInner {
            scheduler: scheduler.clone(),
            group,
            slot: SpinLock::new(Slot::Pending(Box::pin(fut))),
            waiter: SpinLock::new(None),
            rewake_requested: AtomicBool::new(false),
        });

        let kickoff = Arc::clone(&inner);
        let _ = scheduler.submit(
            sched_runtime::current_worker(),
            group,
            sched_runtime::WorkItem::pack(move || poll_once(&kickoff)),
        );

        Self { inner }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.inner.slot.lock(), Slot::Ready(_) | Slot::Taken)
    }
}

impl<R: Send + 'static> Future for CoTask<R> {
    type Output = R;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
        let mut slot = self.inner.slot.lock();
        match &*slot {
            Slot::Ready(_) => {
                let Slot::Ready(value) = std::mem::replace(&mut *slot, Slot::Taken) else {
                    unreachable!()
                };
                Poll::Ready(value)
            }
            Slot::Taken => {
                debug_assert!(false, "CoTask polled again after its single wait point was consumed");
                drop(slot);
                Poll::Pending
            }
            Slot::Pending(_) | Slot::Polling => {
                debug_assert!(
                    self.inner.waiter.lock().is_none(),
                    "CoTask has more than one waiter; it supports a single wait point"
                );
                *self.inner.waiter.lock() = Some(Waiter::Poll(cx.waker().clone()));
                drop(slot);
                Poll::Pending
            }
        }
    }
}

impl<R: Send + 'static> CoTask<R> {
    pub(crate) fn scheduler_handle(&self) -> Scheduler {
        self.inner.scheduler.clone()
    }

    /// Install a callback to run with this task's result once it
    /// resolves. This is the non-`.await` half of the single wait
    /// point: a task consumed via `on_complete` must not also be
    /// `.await`ed, and vice versa.
    pub fn on_complete(self, cb: impl FnOnce(R) + Send + 'static) {
        let mut slot = self.inner.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(value) => {
                drop(slot);
                cb(value);
            }
            other @ (Slot::Pending(_) | Slot::Polling) => {
                *slot = other;
                debug_assert!(
                    self.inner.waiter.lock().is_none(),
                    "CoTask has more than one waiter; it supports a single wait point"
                );
                *self.inner.waiter.lock() = Some(Waiter::Callback(Box::new(cb)));
            }
            Slot::Taken => {
                debug_assert!(false, "CoTask consumed twice past its single wait point");
            }
        }
    }
}

/// A coroutine task that begins executing synchronously on
/// construction, up to its first suspension point, instead of waiting
/// for the scheduler to pick up an initial poll.
pub struct CoSequence<R: Send + 'static> {
    task: CoTask<R>,
}

impl<R: Send + 'static> CoSequence<R> {
    pub fn spawn(
        scheduler: &Scheduler,
        group: WorkgroupId,
        fut: impl Future<Output = R> + Send + 'static,
    ) -> Self {
        let inner = Arc::new(TaskInner {
            scheduler: scheduler.clone(),
            group,
            slot: SpinLock::new(Slot::Pending(Box::pin(fut))),
            waiter: SpinLock::new(None),
            rewake_requested: AtomicBool::new(false),
        });

        // Eager: run the first poll right here instead of submitting it.
        poll_once(&inner);

        Self {
            task: CoTask { inner },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.task.is_ready()
    }

    pub fn into_task(self) -> CoTask<R> {
        self.task
    }
}

impl<R: Send + 'static> Future for CoSequence<R> {
    type Output = R;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
        let task = unsafe { self.map_unchecked_mut(|s| &mut s.task) };
        task.poll(cx)
    }
}
