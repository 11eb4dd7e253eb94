//! Per-(worker, group) MPMC inbox
//!
//! Each worker owns one inbox per workgroup it belongs to. Submission is
//! lock-free on the fast path: a bounded `ArrayQueue` sized to the
//! group's `thread_count * work_scale`. When the ring is full, new items
//! spill into a `SpinLock`-guarded overflow deque rather than blocking
//! the submitter or rejecting the work; the ring is the throughput path
//! and the spill is the safety valve for momentary submission bursts.

use crossbeam_queue::ArrayQueue;
use sched_core::SpinLock;
use std::collections::VecDeque;

use crate::work_item::WorkItem;

/// A single worker's inbox for a single workgroup.
pub struct Inbox {
    ring: ArrayQueue<WorkItem>,
    spill: SpinLock<VecDeque<WorkItem>>,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity.max(1)),
            spill: SpinLock::new(VecDeque::new()),
        }
    }

    /// Enqueue a work item. Never blocks and never rejects: falls back
    /// to the spill deque if the ring is momentarily full.
    pub fn push(&self, item: WorkItem) {
        if let Err(item) = self.ring.push(item) {
            self.spill.lock().push_back(item);
        }
    }

    /// Dequeue the next item, preferring the ring so FIFO-ish order is
    /// preserved for the common case; only consults the spill deque
    /// (and migrates one entry back into the ring) when the ring is
    /// empty.
    pub fn pop(&self) -> Option<WorkItem> {
        if let Some(item) = self.ring.pop() {
            self.drain_spill_into_ring();
            return Some(item);
        }
        self.spill.lock().pop_front()
    }

    /// Dequeue from the ring only, never touching the spill deque. The
    /// spill deque is single-owner — only this inbox's own worker drains
    /// it via `pop`; a thief stealing from a sibling worker's inbox must
    /// only ever see its ring.
    pub fn pop_ring_only(&self) -> Option<WorkItem> {
        self.ring.pop()
    }

    fn drain_spill_into_ring(&self) {
        let mut spill = self.spill.lock();
        while let Some(item) = spill.pop_front() {
            match self.ring.push(item) {
                Ok(()) => continue,
                Err(item) => {
                    spill.push_front(item);
                    break;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty() && self.spill.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.ring.len() + self.spill.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn push_pop_fifo_within_ring() {
        let inbox = Inbox::new(4);
        let order = Arc::new(SpinLock::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            inbox.push(WorkItem::pack(move || order.lock().push(i)));
        }
        while let Some(item) = inbox.pop() {
            item.run();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn spills_when_ring_full() {
        let inbox = Inbox::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            inbox.push(WorkItem::pack(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(inbox.len(), 10);
        let mut ran = 0;
        while let Some(item) = inbox.pop() {
            item.run();
            ran += 1;
        }
        assert_eq!(ran, 10);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn empty_inbox_pops_none() {
        let inbox = Inbox::new(4);
        assert!(inbox.is_empty());
        assert!(inbox.pop().is_none());
    }

    #[test]
    fn pop_ring_only_ignores_spill() {
        let inbox = Inbox::new(1);
        inbox.push(WorkItem::pack(|| {}));
        inbox.push(WorkItem::pack(|| {})); // spills, ring stays full

        assert!(inbox.pop_ring_only().is_some());
        // The ring is now empty again; the spilled item is never
        // visible through the ring-only accessor, only through `pop`.
        assert!(inbox.pop_ring_only().is_none());
        assert_eq!(inbox.len(), 1);
        assert!(inbox.pop().is_some());
    }
}
