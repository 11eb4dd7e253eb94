//! # sched — a lock-free work-stealing task scheduler
//!
//! A small cooperative scheduler: workers pull work from per-(worker,
//! group) lock-free inboxes, steal from siblings when their own are
//! empty, and park when there's nothing left anywhere. Work comes in
//! two shapes:
//!
//! - plain closures, submitted with [`Scheduler::submit`] and run to
//!   completion by whichever worker dequeues them;
//! - coroutine tasks ([`CoTask`] / [`CoSequence`]), `async` blocks
//!   driven forward by re-submitting a "poll me again" work item every
//!   time they'd otherwise suspend.
//!
//! ## Quick start
//!
//! ```ignore
//! use sched::{Runtime, SchedulerConfig, WorkItem};
//!
//! let mut runtime = Runtime::new(SchedulerConfig::default());
//! let group = runtime.create_group(0, runtime.worker_count() as u32, 1, "default").unwrap();
//! runtime.start().unwrap();
//!
//! runtime.scheduler().submit(WorkerId::EXTERNAL, group, WorkItem::pack(|| {
//!     println!("hello from a worker");
//! })).unwrap();
//!
//! runtime.shutdown();
//! ```

pub use sched_core::{
    env_get, env_get_bool, env_get_opt, env_get_str, env_is_set, LogLevel, SchedError,
    SchedResult, WorkerId, WorkgroupId,
};
pub use sched_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, set_time_enabled};

pub use sched_runtime::{current_worker, Scheduler, SchedulerConfig, WorkItem, WorkerContext, Workgroup};
pub use sched_runtime::tls::{current as current_scheduler, release_ownership, take_ownership};

pub use sched_task::{sync_wait_result, CoSequence, CoTask};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// RAII wrapper around a [`Scheduler`]: construct, register groups,
/// `start()`, submit work, then let `Drop` (or an explicit `shutdown()`)
/// join every worker thread.
pub struct Runtime {
    scheduler: Scheduler,
    started: AtomicBool,
}

impl Runtime {
    /// Build a scheduler from `config`. Does not spawn worker threads —
    /// call [`Runtime::start`] (or [`Runtime::block_on`]) once all
    /// workgroups are registered.
    pub fn new(config: SchedulerConfig) -> Self {
        let scheduler = Scheduler::new(config).expect("invalid scheduler configuration");
        Self {
            scheduler,
            started: AtomicBool::new(false),
        }
    }

    /// Access the underlying scheduler handle (cheap to clone out of
    /// the runtime if you need to move it across threads).
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn worker_count(&self) -> usize {
        self.scheduler.worker_count()
    }

    /// Register a workgroup. Must happen before `start`.
    pub fn create_group(
        &self,
        start_thread_idx: u32,
        thread_count: u32,
        priority: u32,
        name: impl Into<String>,
    ) -> SchedResult<WorkgroupId> {
        self.scheduler
            .create_group(start_thread_idx, thread_count, priority, name)
    }

    /// Spawn worker threads and begin draining submitted work.
    pub fn start(&self) -> SchedResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.scheduler.begin_execution()
    }

    /// Run `f` with the scheduler active, then shut down.
    pub fn block_on<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Scheduler) -> T,
    {
        let _ = self.start();
        let result = f(&self.scheduler);
        self.shutdown();
        result
    }

    pub fn shutdown(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            self.scheduler.end_execution();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Wraps a plain `FnOnce() -> R` so it can be handed to [`r#async`]
/// alongside bare futures. `F` and `Future` are different traits with no
/// overlap rule between them, so `r#async` can't take `impl IntoWork<R>`
/// directly over an unwrapped closure — the compiler can't prove some
/// third-party type will never implement both. This newtype sidesteps
/// that: it's a concrete, distinct `Self` type, so its `IntoWork` impl
/// can never collide with the blanket one for futures.
///
/// ```ignore
/// let task = sched::r#async(scheduler, group, sched::work(|| 2 + 2));
/// ```
pub struct FnOnceWork<F>(pub F);

/// Shorthand for [`FnOnceWork`], so a plain closure reads naturally at
/// the call site: `r#async(scheduler, group, work(|| ...))`.
pub fn work<F>(f: F) -> FnOnceWork<F> {
    FnOnceWork(f)
}

/// Anything `r#async` can turn into a running [`CoTask`]: a bare
/// `Future` (this covers coroutine-task handles too, since `CoTask`
/// itself implements `Future`), or a plain closure wrapped in
/// [`FnOnceWork`] (this covers bound-method and free-function
/// submission, which have no first-class Rust equivalent and so are
/// expressed as closures that capture what they need).
pub trait IntoWork<R: Send + 'static> {
    fn into_task(self, scheduler: &Scheduler, group: WorkgroupId) -> CoTask<R>;
}

impl<R, F> IntoWork<R> for F
where
    R: Send + 'static,
    F: Future<Output = R> + Send + 'static,
{
    fn into_task(self, scheduler: &Scheduler, group: WorkgroupId) -> CoTask<R> {
        CoTask::spawn(scheduler, group, self)
    }
}

impl<R, F> IntoWork<R> for FnOnceWork<F>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    fn into_task(self, scheduler: &Scheduler, group: WorkgroupId) -> CoTask<R> {
        CoTask::spawn(scheduler, group, async move { (self.0)() })
    }
}

/// Uniform sugar entry point for scheduling work onto a workgroup,
/// returning a handle to its eventual result. Accepts a plain closure
/// (wrapped in [`work`]/[`FnOnceWork`]), a `Future`, or a coroutine-task
/// handle (which is itself a `Future`) — see [`IntoWork`]. The name is
/// escaped with `r#` because `async` is a keyword.
pub fn r#async<R, W>(scheduler: &Scheduler, group: WorkgroupId, item: W) -> CoTask<R>
where
    R: Send + 'static,
    W: IntoWork<R>,
{
    item.into_task(scheduler, group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn runtime_runs_a_closure() {
        let runtime = Runtime::new(SchedulerConfig::new().worker_count(2));
        let group = runtime.create_group(0, 2, 1, "default").unwrap();
        runtime.start().unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        runtime
            .scheduler()
            .submit(WorkerId::EXTERNAL, group, WorkItem::pack(move || tx.send(()).unwrap()))
            .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn async_sugar_resolves() {
        let runtime = Runtime::new(SchedulerConfig::new().worker_count(2));
        let group = runtime.create_group(0, 2, 1, "default").unwrap();
        runtime.start().unwrap();

        let task = r#async(runtime.scheduler(), group, async { 1 + 2 });
        let result = sync_wait_result(task);
        assert_eq!(result, 3);
    }
}
