//! Type-erased, inline-stored work items
//!
//! A `WorkItem` is a `FnOnce()` packed into a fixed-size inline buffer so
//! that submitting work never allocates. The buffer is sized to hold the
//! common case (a closure capturing a handful of words); anything larger
//! is rejected at the `submit` call site by a compile-time size check,
//! not silently boxed, so callers notice the cost of a fat capture
//! immediately rather than at a profiler.

use std::mem::MaybeUninit;
use std::ptr;

/// Inline buffer size, in `usize` words. Three words covers a pointer +
/// two embedded values (e.g. `Arc<T>` + an index), which covers the
/// overwhelming majority of scheduler call sites observed in practice.
pub const INLINE_WORDS: usize = 3;
const INLINE_BYTES: usize = INLINE_WORDS * std::mem::size_of::<usize>();

#[repr(align(8))]
struct Buffer([MaybeUninit<u8>; INLINE_BYTES]);

type InvokeFn = unsafe fn(*mut u8);
type DropFn = unsafe fn(*mut u8);

/// A single unit of scheduled work: a `FnOnce()` stored inline.
///
/// Construct with [`WorkItem::pack`]. Running a `WorkItem` twice, or
/// dropping it without running it, both invoke the closure's drop glue
/// exactly once.
pub struct WorkItem {
    buf: Buffer,
    invoke: InvokeFn,
    drop_fn: DropFn,
    invoked: bool,
}

impl WorkItem {
    /// Pack `f` into a work item.
    ///
    /// This call site requires `size_of::<F>() <= INLINE_BYTES`; the
    /// const block below turns an oversized closure into a compile
    /// error rather than an unbounded heap allocation.
    pub fn pack<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        const {
            assert!(
                std::mem::size_of::<F>() <= INLINE_BYTES,
                "closure capture too large to inline in a WorkItem; shrink the capture (e.g. box large state and capture the Box, or capture an Arc)"
            );
            assert!(std::mem::align_of::<F>() <= 8);
        }

        let mut buf = Buffer([MaybeUninit::uninit(); INLINE_BYTES]);
        unsafe {
            let slot = buf.0.as_mut_ptr() as *mut F;
            ptr::write(slot, f);
        }

        unsafe fn invoke<F: FnOnce()>(ptr: *mut u8) {
            let f = ptr::read(ptr as *mut F);
            f();
        }
        unsafe fn drop_glue<F>(ptr: *mut u8) {
            ptr::drop_in_place(ptr as *mut F);
        }

        Self {
            buf,
            invoke: invoke::<F>,
            drop_fn: drop_glue::<F>,
            invoked: false,
        }
    }

    /// Run the closure. Panics propagate to the caller (the worker loop
    /// installs a panic hook around this call; see `worker.rs`).
    pub fn run(mut self) {
        debug_assert!(!self.invoked);
        self.invoked = true;
        unsafe {
            (self.invoke)(self.buf.0.as_mut_ptr() as *mut u8);
        }
    }
}

impl Drop for WorkItem {
    fn drop(&mut self) {
        if !self.invoked {
            self.invoked = true;
            unsafe {
                (self.drop_fn)(self.buf.0.as_mut_ptr() as *mut u8);
            }
        }
    }
}

// WorkItem is Send because `pack` requires F: Send. It is not Sync: a
// half-run item's buffer must not be read from two threads at once.
unsafe impl Send for WorkItem {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let item = WorkItem::pack(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        item.run();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drops_without_running() {
        struct DropMarker(Arc<AtomicUsize>);
        impl Drop for DropMarker {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let marker = DropMarker(Arc::clone(&counter));
        let item = WorkItem::pack(move || {
            let _keep_alive = &marker;
        });
        drop(item);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn small_capture_fits() {
        let a: usize = 1;
        let b: usize = 2;
        let item = WorkItem::pack(move || {
            let _ = (a, b);
        });
        item.run();
    }
}
