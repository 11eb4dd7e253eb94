//! Per-worker wake event
//!
//! Each worker owns one `WorkerParking` instance: its "wake event". A
//! worker parks on it when every inbox it owns, its local spill deque,
//! and its steal targets were observed empty; `submit` signals the
//! target worker's event iff that worker was last observed parked.
//! Spurious wakes are tolerated — a woken worker simply re-checks for
//! work and parks again if there is none.

use std::time::Duration;

pub trait WorkerParking: Send + Sync {
    /// Park until signaled or `timeout` elapses.
    ///
    /// Returns `true` if woken by a signal, `false` on timeout or a
    /// spurious wakeup. Callers must re-check for work regardless.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Wake this worker if it is parked. If not parked, the wake is not
    /// queued — the worker is busy and will see the new work on its own.
    fn wake_one(&self);

    /// Wake this worker unconditionally (used at `end_execution`).
    fn wake_all(&self);

    /// Hint: is this worker currently parked? May be stale.
    fn parked_count(&self) -> usize;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Create a new platform-appropriate parking instance for one worker.
pub fn new_parking() -> Box<dyn WorkerParking> {
    Box::new(PlatformParking::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn park_times_out() {
        let parking = new_parking();
        let start = std::time::Instant::now();
        let woken = parking.park(Some(Duration::from_millis(50)));
        let elapsed = start.elapsed();
        assert!(!woken || elapsed < Duration::from_millis(200));
        assert!(elapsed >= Duration::from_millis(40));
    }

    #[test]
    fn wake_one_unparks() {
        let parking = Arc::new(PlatformParking::new());
        let other = Arc::clone(&parking);

        let handle = thread::spawn(move || other.park(Some(Duration::from_secs(10))));

        thread::sleep(Duration::from_millis(50));
        parking.wake_one();

        assert!(handle.join().unwrap());
    }
}
