//! Workgroup definitions
//!
//! A workgroup pins a contiguous range of workers and gives them a
//! priority and an inbox sizing hint. Workers outside the range never
//! dequeue work submitted to the group.

use sched_core::{SchedError, SchedResult, WorkgroupId};

/// A named slice of the worker pool with its own priority and per-worker
/// inbox capacity multiplier.
#[derive(Debug, Clone)]
pub struct Workgroup {
    pub id: WorkgroupId,
    pub start_thread_idx: u32,
    pub thread_count: u32,
    pub priority: u32,
    pub work_scale: u32,
    pub name: String,
}

impl Workgroup {
    pub(crate) fn new(
        id: WorkgroupId,
        start_thread_idx: u32,
        thread_count: u32,
        priority: u32,
        work_scale: u32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            start_thread_idx,
            thread_count,
            priority,
            work_scale,
            name: name.into(),
        }
    }

    /// Inbox ring capacity for a single worker in this group.
    pub fn inbox_capacity(&self) -> usize {
        (self.thread_count * self.work_scale).max(1) as usize
    }

    /// Is `worker_idx` (0-based, pool-relative) a member of this group?
    pub fn contains_worker(&self, worker_idx: u32) -> bool {
        worker_idx >= self.start_thread_idx
            && worker_idx < self.start_thread_idx + self.thread_count
    }

    /// Validate the range against the pool's worker count.
    pub(crate) fn validate(&self, worker_count: u32) -> SchedResult<()> {
        if self.thread_count == 0 {
            return Err(SchedError::InvalidState);
        }
        let end = self
            .start_thread_idx
            .checked_add(self.thread_count)
            .ok_or(SchedError::OutOfRange)?;
        if end > worker_count {
            return Err(SchedError::OutOfRange);
        }
        Ok(())
    }
}

/// Default per-worker inbox multiplier used by `create_group` when the
/// caller doesn't supply one explicitly.
pub const DEFAULT_WORK_SCALE: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    fn wg(start: u32, count: u32) -> Workgroup {
        Workgroup::new(WorkgroupId::new(0), start, count, 1, DEFAULT_WORK_SCALE, "test")
    }

    #[test]
    fn contains_worker_bounds() {
        let g = wg(2, 3);
        assert!(!g.contains_worker(1));
        assert!(g.contains_worker(2));
        assert!(g.contains_worker(4));
        assert!(!g.contains_worker(5));
    }

    #[test]
    fn inbox_capacity_scales() {
        let g = wg(0, 4);
        assert_eq!(g.inbox_capacity(), 16);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let g = wg(6, 4);
        assert!(g.validate(8).is_err());
        assert!(g.validate(10).is_ok());
    }

    #[test]
    fn validate_rejects_zero_members() {
        let g = wg(0, 0);
        assert!(g.validate(8).is_err());
    }
}
