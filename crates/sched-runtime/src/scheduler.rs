//! The scheduler: workgroup registry, submission, and the worker loop
//!
//! `Scheduler` is a cheap-to-clone handle (`Arc<SchedulerInner>`), so a
//! process can run more than one scheduler concurrently — each with its
//! own worker pool, workgroups and inboxes. There is no global
//! singleton; `take_ownership` (see `tls.rs`) is the only place a handle
//! is stashed in thread-local storage, and that's purely a convenience
//! for code that wants `sched::this_scheduler()`-style access.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use sched_core::{SchedError, SchedResult, SpinLock, WorkerId, WorkgroupId};

use crate::config::SchedulerConfig;
use crate::inbox::Inbox;
use crate::work_item::WorkItem;
use crate::worker::{current_worker, WorkerPool, STEAL_ATTEMPTS};
use crate::workgroup::Workgroup;

/// `Draining` is transient: it only exists between `request_shutdown`
/// and `join` inside `end_execution`, never observed by a caller. A
/// full cycle is `Created -> Running -> Draining -> Created`, repeatable
/// any number of times.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Created = 0,
    Running = 1,
    Draining = 2,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            _ => Self::Draining,
        }
    }
}

/// A registered workgroup plus one inbox per member worker.
struct GroupRuntime {
    group: Workgroup,
    /// `inboxes[i]` is the inbox for worker `group.start_thread_idx + i`.
    inboxes: Vec<Arc<Inbox>>,
}

/// Shared scheduler state. See `Scheduler` for the public handle.
struct SchedulerInner {
    config: SchedulerConfig,
    pool: WorkerPool,
    groups: SpinLock<Vec<Arc<GroupRuntime>>>,
    /// Per-worker dequeue order, built once at `begin_execution`:
    /// indices into `groups`, sorted by descending priority then
    /// ascending workgroup id, restricted to groups the worker belongs
    /// to.
    scan_order: SpinLock<Vec<Vec<usize>>>,
    state: AtomicU8,
    next_group_id: AtomicU32,
    /// Count of submitted-but-not-yet-run work items, used for
    /// quiescence detection by `wait_quiescent`.
    in_flight: AtomicUsize,
}

/// Cheap-clone handle to a scheduler instance.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> SchedResult<Self> {
        config.validate().map_err(|_| SchedError::InvalidState)?;
        let worker_count = config.worker_count;

        let inner = SchedulerInner {
            pool: WorkerPool::new(worker_count),
            groups: SpinLock::new(Vec::new()),
            scan_order: SpinLock::new(vec![Vec::new(); worker_count]),
            state: AtomicU8::new(LifecycleState::Created as u8),
            next_group_id: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.inner.pool.num_workers()
    }

    fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Register a new workgroup. Must be called before `begin_execution`
    /// — groups are frozen once the pool starts so worker scan order
    /// never changes under a running scheduler.
    pub fn create_group(
        &self,
        start_thread_idx: u32,
        thread_count: u32,
        priority: u32,
        name: impl Into<String>,
    ) -> SchedResult<WorkgroupId> {
        let id = WorkgroupId::new(self.inner.next_group_id.fetch_add(1, Ordering::SeqCst));
        self.register_group(id, start_thread_idx, thread_count, priority, name)?;
        Ok(id)
    }

    /// Register a new workgroup under a caller-chosen id rather than an
    /// auto-assigned one. Fails with `GroupAlreadyExists` if `id` is
    /// already registered — `clear_group` it first to reuse the id.
    /// Useful for callers that need a stable, predictable id across a
    /// `create_group`/`clear_group`/`create_group` round trip.
    pub fn create_group_with_id(
        &self,
        id: WorkgroupId,
        start_thread_idx: u32,
        thread_count: u32,
        priority: u32,
        name: impl Into<String>,
    ) -> SchedResult<()> {
        if self.inner.groups.lock().iter().any(|g| g.group.id == id) {
            return Err(SchedError::GroupAlreadyExists);
        }
        self.register_group(id, start_thread_idx, thread_count, priority, name)
    }

    fn register_group(
        &self,
        id: WorkgroupId,
        start_thread_idx: u32,
        thread_count: u32,
        priority: u32,
        name: impl Into<String>,
    ) -> SchedResult<()> {
        if self.state() != LifecycleState::Created {
            return Err(SchedError::InvalidState);
        }

        let group = Workgroup::new(
            id,
            start_thread_idx,
            thread_count,
            priority,
            self.inner.config.default_work_scale,
            name,
        );
        group.validate(self.worker_count() as u32)?;

        let capacity = group.inbox_capacity();
        let inboxes = (0..thread_count).map(|_| Arc::new(Inbox::new(capacity))).collect();

        self.inner.groups.lock().push(Arc::new(GroupRuntime { group, inboxes }));

        Ok(())
    }

    /// Remove a previously created group. Only valid before
    /// `begin_execution`.
    pub fn clear_group(&self, id: WorkgroupId) -> SchedResult<()> {
        if self.state() != LifecycleState::Created {
            return Err(SchedError::InvalidState);
        }
        let mut groups = self.inner.groups.lock();
        let before = groups.len();
        groups.retain(|g| g.group.id != id);
        if groups.len() == before {
            return Err(SchedError::UnknownGroup);
        }
        Ok(())
    }

    fn group_index(&self, groups: &[Arc<GroupRuntime>], id: WorkgroupId) -> SchedResult<usize> {
        groups
            .iter()
            .position(|g| g.group.id == id)
            .ok_or(SchedError::UnknownGroup)
    }

    /// Freeze workgroups, compute dequeue order, and spawn worker
    /// threads. Idempotent while already running: calling twice in a row
    /// is a no-op on the second call. Can be called again after a
    /// matching `end_execution` — state returns to `Created` at the end
    /// of that call, so a scheduler can be stopped and restarted any
    /// number of times, rebuilding scan order and respawning workers
    /// each time.
    pub fn begin_execution(&self) -> SchedResult<()> {
        if self
            .inner
            .state
            .compare_exchange(
                LifecycleState::Created as u8,
                LifecycleState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }

        let groups = self.inner.groups.lock().clone();
        let worker_count = self.worker_count();
        let mut scan_order = vec![Vec::new(); worker_count];

        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by(|&a, &b| {
            groups[b]
                .group
                .priority
                .cmp(&groups[a].group.priority)
                .then(groups[a].group.id.as_u32().cmp(&groups[b].group.id.as_u32()))
        });

        for worker_idx in 0..worker_count {
            for &group_idx in &order {
                if groups[group_idx].group.contains_worker(worker_idx as u32) {
                    scan_order[worker_idx].push(group_idx);
                }
            }
        }
        *self.inner.scan_order.lock() = scan_order;

        let inner_for_loop = Arc::clone(&self.inner);
        self.inner
            .pool
            .start(move |id| worker_loop(Arc::clone(&inner_for_loop), id));

        Ok(())
    }

    /// Wake every worker so it observes the stop flag, join all worker
    /// threads, and unfreeze group configuration. Returns the scheduler
    /// to `Created`, so `create_group`/`clear_group` work again and a
    /// later `begin_execution` starts a fresh pool from scratch —
    /// matching `Scheduler::new`'s own state, not a terminal `Stopped`
    /// state.
    pub fn end_execution(&self) {
        if self
            .inner
            .state
            .compare_exchange(
                LifecycleState::Running as u8,
                LifecycleState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }
        self.inner.pool.request_shutdown();
        self.inner.pool.join();
        self.inner.pool.reset_shutdown();

        self.inner
            .state
            .store(LifecycleState::Created as u8, Ordering::Release);
    }

    /// Submit work to a workgroup, dispatched to one of its member
    /// workers by a per-submitter stride instead of a shared atomic
    /// counter: `src` seeds the starting slot and a thread-local counter
    /// (incremented per call, never shared across threads) advances it,
    /// so concurrent submitters from different threads never contend on
    /// the same cache line to pick a target. `src` is `WorkerId::EXTERNAL`
    /// for calls from outside the worker pool.
    pub fn submit(&self, src: WorkerId, group: WorkgroupId, item: WorkItem) -> SchedResult<()> {
        let groups = self.inner.groups.lock().clone();
        let idx = self.group_index(&groups, group)?;
        let runtime = &groups[idx];

        let n = runtime.inboxes.len();
        if n == 0 {
            return Err(SchedError::InvalidState);
        }
        let slot = submit_stride(src, n);

        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        runtime.inboxes[slot].push(item);

        let worker_idx = runtime.group.start_thread_idx + slot as u32;
        self.inner.pool.worker(WorkerId::new(worker_idx)).notify();
        Ok(())
    }

    /// Submit work to a specific worker within a group (exclusive
    /// dispatch). Fails if `worker` isn't a member of `group`.
    pub fn submit_to_worker(
        &self,
        _src: WorkerId,
        worker: WorkerId,
        group: WorkgroupId,
        item: WorkItem,
    ) -> SchedResult<()> {
        let groups = self.inner.groups.lock().clone();
        let idx = self.group_index(&groups, group)?;
        let runtime = &groups[idx];

        if !runtime.group.contains_worker(worker.as_u32()) {
            return Err(SchedError::UnknownWorker);
        }
        let slot = (worker.as_u32() - runtime.group.start_thread_idx) as usize;

        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        runtime.inboxes[slot].push(item);
        self.inner.pool.worker(worker).notify();
        Ok(())
    }

    /// Run one pending item belonging to `worker` if one is available,
    /// without parking. Intended for external/worker threads blocked in
    /// `sync_wait_result` that want to make progress instead of idling.
    /// Returns `true` if an item ran. A no-op for a non-addressable
    /// (`NONE`/`EXTERNAL`) worker id.
    pub fn busy_work(&self, worker: WorkerId) -> bool {
        if !worker.is_addressable() {
            return false;
        }
        let groups = self.inner.groups.lock().clone();
        let scan_order = self.inner.scan_order.lock().clone();
        try_run_one(&groups, &scan_order, worker, &self.inner.in_flight)
    }

    /// True once every submitted item has completed and no worker has
    /// anything queued. Racy by nature (more work may be submitted
    /// concurrently) — callers that need a stable snapshot should stop
    /// submitting before calling this.
    pub fn is_quiescent(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) == 0
    }

    pub fn get_worker_count(&self) -> usize {
        self.worker_count()
    }

    /// Worker count of a single group, as opposed to the whole scheduler.
    pub fn get_group_worker_count(&self, group: WorkgroupId) -> SchedResult<u32> {
        let groups = self.inner.groups.lock();
        let idx = self.group_index(&groups, group)?;
        Ok(groups[idx].group.thread_count)
    }

    pub fn get_worker_start_idx(&self, group: WorkgroupId) -> SchedResult<u32> {
        let groups = self.inner.groups.lock();
        let idx = self.group_index(&groups, group)?;
        Ok(groups[idx].group.start_thread_idx)
    }

    pub fn get_logical_divisor(&self, group: WorkgroupId) -> SchedResult<u32> {
        let groups = self.inner.groups.lock();
        let idx = self.group_index(&groups, group)?;
        Ok(groups[idx].group.work_scale)
    }

    /// A worker's view of its place within a group: its zero-based slot,
    /// the group's member count and its logical divisor (work_scale).
    pub fn get_context(&self, worker: WorkerId, group: WorkgroupId) -> SchedResult<WorkerContext> {
        let groups = self.inner.groups.lock();
        let idx = self.group_index(&groups, group)?;
        let g = &groups[idx].group;
        if !g.contains_worker(worker.as_u32()) {
            return Err(SchedError::UnknownWorker);
        }
        Ok(WorkerContext {
            worker,
            group,
            index_in_group: worker.as_u32() - g.start_thread_idx,
            group_worker_count: g.thread_count,
            logical_divisor: g.work_scale,
        })
    }
}

/// A worker's position within a workgroup, returned by
/// [`Scheduler::get_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    pub worker: WorkerId,
    pub group: WorkgroupId,
    pub index_in_group: u32,
    pub group_worker_count: u32,
    pub logical_divisor: u32,
}

thread_local! {
    /// Per-submitter-thread stride, advanced on every `submit` call from
    /// this thread. Combined with `src`'s id as the starting offset,
    /// this spreads submissions round-robin-ish across a group's
    /// workers without any cross-thread shared counter.
    static SUBMIT_CURSOR: Cell<usize> = const { Cell::new(0) };
}

fn submit_stride(src: WorkerId, n: usize) -> usize {
    let cursor = SUBMIT_CURSOR.with(|c| {
        let v = c.get();
        c.set(v.wrapping_add(1));
        v
    });
    (src.as_u32() as usize).wrapping_add(cursor) % n
}

/// Try to pop and run exactly one item from `worker`'s own inboxes
/// (scan order), then — failing that — steal from a bounded number of
/// random sibling workers in the same groups.
fn try_run_one(
    groups: &[Arc<GroupRuntime>],
    scan_order: &[Vec<usize>],
    worker: WorkerId,
    in_flight: &AtomicUsize,
) -> bool {
    let own_order = &scan_order[worker.as_usize()];

    for &group_idx in own_order {
        let runtime = &groups[group_idx];
        let offset = (worker.as_u32() - runtime.group.start_thread_idx) as usize;
        if let Some(item) = runtime.inboxes[offset].pop() {
            run_item(item, in_flight);
            return true;
        }
    }

    thread_local! {
        static STEAL_SEED: Cell<u64> = Cell::new(0);
    }
    STEAL_SEED.with(|seed| {
        if seed.get() == 0 {
            seed.set(worker.as_u32() as u64 * 2654435761 + 1);
        }
    });

    for &group_idx in own_order {
        let runtime = &groups[group_idx];
        let n = runtime.inboxes.len();
        let own_offset = (worker.as_u32() - runtime.group.start_thread_idx) as usize;
        if n <= 1 {
            continue;
        }
        for _ in 0..STEAL_ATTEMPTS {
            let victim = STEAL_SEED.with(|seed| {
                let mut x = seed.get();
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                seed.set(x);
                (x as usize) % n
            });
            if victim == own_offset {
                continue;
            }
            // Ring only: a victim's spill deque is single-owner (see
            // `Inbox::pop_ring_only`), drained only by its own worker.
            if let Some(item) = runtime.inboxes[victim].pop_ring_only() {
                run_item(item, in_flight);
                return true;
            }
        }
    }

    false
}

fn run_item(item: WorkItem, in_flight: &AtomicUsize) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| item.run()));
    in_flight.fetch_sub(1, Ordering::SeqCst);
    if result.is_err() {
        serror!("work item panicked; aborting process per fail-fast policy");
        std::process::abort();
    }
}

/// Body of a worker's OS thread: scan, steal, park, repeat until told
/// to shut down.
fn worker_loop(inner: Arc<SchedulerInner>, id: WorkerId) {
    sdebug!("worker {} starting", id.as_u32());
    loop {
        if inner.pool.is_shutdown() {
            break;
        }

        let groups = inner.groups.lock().clone();
        let scan_order = inner.scan_order.lock().clone();

        if try_run_one(&groups, &scan_order, id, &inner.in_flight) {
            continue;
        }

        if inner.pool.is_shutdown() {
            break;
        }
        inner.pool.worker(id).park();
    }
    sdebug!("worker {} stopping", id.as_u32());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn create_group_then_submit_runs_work() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(2)).unwrap();
        let group = sched.create_group(0, 2, 1, "default").unwrap();
        sched.begin_execution().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let c = Arc::clone(&counter);
            sched
                .submit(WorkerId::EXTERNAL, group, WorkItem::pack(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 100 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);

        sched.end_execution();
    }

    #[test]
    fn submit_to_worker_is_exclusive() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(3)).unwrap();
        let group = sched.create_group(0, 3, 1, "default").unwrap();
        sched.begin_execution().unwrap();

        let seen = Arc::new(SpinLock::new(None));
        let seen2 = Arc::clone(&seen);
        sched
            .submit_to_worker(WorkerId::EXTERNAL, WorkerId::new(1), group, WorkItem::pack(move || {
                *seen2.lock() = Some(current_worker().as_u32());
            }))
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while seen.lock().is_none() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*seen.lock(), Some(1));

        sched.end_execution();
    }

    #[test]
    fn create_group_rejects_after_begin_execution() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(1)).unwrap();
        sched.begin_execution().unwrap();
        assert!(sched.create_group(0, 1, 1, "late").is_err());
        sched.end_execution();
    }

    #[test]
    fn create_group_with_id_round_trips_through_clear_group() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(4)).unwrap();
        let id = WorkgroupId::new(7);

        sched.create_group_with_id(id, 1, 2, 5, "g").unwrap();
        let count_before = sched.get_group_worker_count(id).unwrap();
        let start_before = sched.get_worker_start_idx(id).unwrap();

        sched.clear_group(id).unwrap();
        assert!(sched.create_group_with_id(id, 0, 1, 1, "other").is_ok());
        sched.clear_group(id).unwrap();

        sched.create_group_with_id(id, 1, 2, 5, "g").unwrap();
        assert_eq!(sched.get_group_worker_count(id).unwrap(), count_before);
        assert_eq!(sched.get_worker_start_idx(id).unwrap(), start_before);
    }

    #[test]
    fn create_group_with_id_rejects_duplicate() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(2)).unwrap();
        let id = WorkgroupId::new(3);
        sched.create_group_with_id(id, 0, 1, 1, "first").unwrap();
        assert_eq!(
            sched.create_group_with_id(id, 0, 1, 1, "second"),
            Err(SchedError::GroupAlreadyExists)
        );
    }

    #[test]
    fn priority_groups_drain_high_before_low() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(1)).unwrap();
        let low = sched.create_group(0, 1, 1, "low").unwrap();
        let high = sched.create_group(0, 1, 10, "high").unwrap();
        sched.begin_execution().unwrap();

        let order = Arc::new(SpinLock::new(Vec::new()));
        let o1 = Arc::clone(&order);
        sched.submit(WorkerId::EXTERNAL, low, WorkItem::pack(move || o1.lock().push("low"))).unwrap();
        let o2 = Arc::clone(&order);
        sched.submit(WorkerId::EXTERNAL, high, WorkItem::pack(move || o2.lock().push("high"))).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while order.lock().len() < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*order.lock(), vec!["high", "low"]);

        sched.end_execution();
    }

    #[test]
    fn context_reports_index_within_group() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(4)).unwrap();
        let group = sched.create_group(1, 2, 1, "g").unwrap();

        assert_eq!(sched.get_group_worker_count(group).unwrap(), 2);

        let ctx = sched.get_context(WorkerId::new(2), group).unwrap();
        assert_eq!(ctx.index_in_group, 1);
        assert_eq!(ctx.group_worker_count, 2);
        assert_eq!(ctx.logical_divisor, crate::workgroup::DEFAULT_WORK_SCALE);

        assert!(sched.get_context(WorkerId::new(0), group).is_err());
    }

    #[test]
    fn restarts_after_end_execution() {
        let sched = Scheduler::new(SchedulerConfig::new().worker_count(2)).unwrap();
        let group = sched.create_group(0, 2, 1, "default").unwrap();
        sched.begin_execution().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let c = Arc::clone(&counter);
            sched.submit(WorkerId::EXTERNAL, group, WorkItem::pack(move || { c.fetch_add(1, Ordering::SeqCst); })).unwrap();
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 50 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        sched.end_execution();

        // Group configuration is unfrozen again: clear and recreate,
        // then run a second begin/end cycle identical to the first.
        sched.clear_group(group).unwrap();
        let group = sched.create_group(0, 2, 1, "default").unwrap();
        sched.begin_execution().unwrap();

        let counter2 = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let c = Arc::clone(&counter2);
            sched.submit(WorkerId::EXTERNAL, group, WorkItem::pack(move || { c.fetch_add(1, Ordering::SeqCst); })).unwrap();
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter2.load(Ordering::SeqCst) < 50 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter2.load(Ordering::SeqCst), 50);
        sched.end_execution();
    }
}
