//! Worker threads
//!
//! Each worker is an OS thread running a fixed loop: scan owned inboxes
//! highest-priority-group-first, fall back to stealing from a random
//! sibling, and park on its own wake event when nothing is found.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sched_core::WorkerId;

use crate::parking::{new_parking, WorkerParking};

/// How long a worker parks before waking to re-scan, even without a
/// signal. Bounds the latency of a submission racing a worker's
/// park-check window (see `submit`'s wake-iff-parked optimization).
const PARK_TIMEOUT: Duration = Duration::from_millis(50);

/// Bounded random-victim steal attempts before a worker parks.
pub const STEAL_ATTEMPTS: usize = 4;

thread_local! {
    static CURRENT_WORKER: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Set the calling thread's worker id. Called once at the top of a
/// worker's loop; external threads never set this (`WorkerId::EXTERNAL`
/// is implied by its absence).
pub fn set_current_worker(id: WorkerId) {
    CURRENT_WORKER.with(|c| c.set(Some(id.as_u32())));
    sched_core::kprint::set_worker_id(id.as_u32());
}

pub fn clear_current_worker() {
    CURRENT_WORKER.with(|c| c.set(None));
    sched_core::kprint::clear_worker_id();
}

/// The calling thread's worker id, or `WorkerId::EXTERNAL` if this
/// thread never joined the pool.
pub fn current_worker() -> WorkerId {
    match CURRENT_WORKER.with(Cell::get) {
        Some(id) => WorkerId::new(id),
        None => WorkerId::EXTERNAL,
    }
}

/// Per-worker bookkeeping visible to the rest of the scheduler: its wake
/// event and a cheap "might have work" hint so other workers can skip
/// waking a worker that's already awake and spinning.
pub struct WorkerHandle {
    pub id: WorkerId,
    pub parking: Box<dyn WorkerParking>,
    parked: AtomicBool,
}

impl WorkerHandle {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            parking: new_parking(),
            parked: AtomicBool::new(false),
        }
    }

    /// Wake this worker if — and only if — it was last observed parked.
    /// A busy worker will discover new work on its own next scan.
    pub fn notify(&self) {
        if self.parked.load(Ordering::Acquire) {
            self.parking.wake_one();
        }
    }

    pub fn park(&self) {
        self.parked.store(true, Ordering::Release);
        self.parking.park(Some(PARK_TIMEOUT));
        self.parked.store(false, Ordering::Release);
    }

    pub fn wake_unconditionally(&self) {
        self.parking.wake_all();
    }
}

/// Pool of worker OS threads sharing one scan-and-run loop.
pub struct WorkerPool {
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers: Vec<Arc<WorkerHandle>>,
    shutdown: Arc<AtomicBool>,
    started: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        let workers = (0..num_workers)
            .map(|i| Arc::new(WorkerHandle::new(WorkerId::new(i as u32))))
            .collect();

        Self {
            handles: Mutex::new(Vec::with_capacity(num_workers)),
            workers,
            shutdown: Arc::new(AtomicBool::new(false)),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, id: WorkerId) -> &Arc<WorkerHandle> {
        &self.workers[id.as_usize()]
    }

    pub fn workers(&self) -> &[Arc<WorkerHandle>] {
        &self.workers
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn all worker threads. `run_loop` is the body executed per
    /// worker (it owns the dequeue/steal/park policy in `scheduler.rs`);
    /// this type only owns thread lifecycle. Intended to be called
    /// exactly once; the caller (`Scheduler::begin_execution`) enforces
    /// that with its own lifecycle state transition.
    pub fn start<F>(&self, run_loop: F)
    where
        F: Fn(WorkerId) + Send + Sync + Clone + 'static,
    {
        let mut handles = self.handles.lock().unwrap();
        for worker in self.workers.clone() {
            let run_loop = run_loop.clone();
            let started = Arc::clone(&self.started);
            let id = worker.id;

            let handle = thread::Builder::new()
                .name(format!("sched-worker-{}", id.as_u32()))
                .spawn(move || {
                    set_current_worker(id);
                    started.fetch_add(1, Ordering::SeqCst);
                    run_loop(id);
                    clear_current_worker();
                })
                .expect("failed to spawn scheduler worker thread");

            handles.push(handle);
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.wake_unconditionally();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Clear the shutdown flag so a joined pool can be restarted by a
    /// fresh `start` call. Must only be called after `join` returns.
    pub fn reset_shutdown(&self) {
        self.shutdown.store(false, Ordering::Release);
        self.started.store(0, Ordering::SeqCst);
    }

    pub fn join(&self) {
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_worker_defaults_to_external() {
        assert_eq!(current_worker(), WorkerId::EXTERNAL);
    }

    #[test]
    fn set_and_clear_current_worker() {
        set_current_worker(WorkerId::new(3));
        assert_eq!(current_worker(), WorkerId::new(3));
        clear_current_worker();
        assert_eq!(current_worker(), WorkerId::EXTERNAL);
    }

    #[test]
    fn notify_is_noop_when_not_parked() {
        let handle = WorkerHandle::new(WorkerId::new(0));
        handle.notify();
    }

    #[test]
    fn pool_spawns_and_joins() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(4);
        let c = Arc::clone(&counter);
        pool.start(move |_id| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
