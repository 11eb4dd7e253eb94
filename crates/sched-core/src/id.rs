//! Worker and workgroup identifiers

use core::fmt;

/// Dense identifier for a worker thread.
///
/// Indexes into `[0, worker_count)`. `u32::MAX` is reserved as the `NONE`
/// sentinel; `u32::MAX - 1` is reserved for [`WorkerId::EXTERNAL`], the
/// submitter tag used by callers that are not themselves a worker thread.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Sentinel value indicating no worker.
    pub const NONE: WorkerId = WorkerId(u32::MAX);

    /// Submitter tag for calls made from outside any worker thread.
    pub const EXTERNAL: WorkerId = WorkerId(u32::MAX - 1);

    #[inline]
    pub const fn new(id: u32) -> Self {
        WorkerId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    #[inline]
    pub const fn is_external(self) -> bool {
        self.0 == Self::EXTERNAL.0
    }

    /// True for a dense worker index (not `NONE`, not `EXTERNAL`).
    #[inline]
    pub const fn is_addressable(self) -> bool {
        !self.is_none() && !self.is_external()
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "WorkerId(NONE)")
        } else if self.is_external() {
            write!(f, "WorkerId(EXTERNAL)")
        } else {
            write!(f, "WorkerId({})", self.0)
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else if self.is_external() {
            write!(f, "external")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        WorkerId::NONE
    }
}

impl From<u32> for WorkerId {
    #[inline]
    fn from(id: u32) -> Self {
        WorkerId(id)
    }
}

impl From<WorkerId> for u32 {
    #[inline]
    fn from(id: WorkerId) -> Self {
        id.0
    }
}

/// Dense identifier for a workgroup, indexing into the scheduler's group
/// table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WorkgroupId(u32);

impl WorkgroupId {
    pub const NONE: WorkgroupId = WorkgroupId(u32::MAX);

    #[inline]
    pub const fn new(id: u32) -> Self {
        WorkgroupId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for WorkgroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "WorkgroupId(NONE)")
        } else {
            write!(f, "WorkgroupId({})", self.0)
        }
    }
}

impl fmt::Display for WorkgroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for WorkgroupId {
    fn default() -> Self {
        WorkgroupId::NONE
    }
}

impl From<u32> for WorkgroupId {
    #[inline]
    fn from(id: u32) -> Self {
        WorkgroupId(id)
    }
}

impl From<WorkgroupId> for u32 {
    #[inline]
    fn from(id: WorkgroupId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_sentinels() {
        let id = WorkerId::new(3);
        assert!(id.is_addressable());
        assert!(!WorkerId::NONE.is_addressable());
        assert!(!WorkerId::EXTERNAL.is_addressable());
        assert!(WorkerId::EXTERNAL.is_external());
        assert_ne!(WorkerId::NONE, WorkerId::EXTERNAL);
    }

    #[test]
    fn workgroup_id_conversions() {
        let g: WorkgroupId = 7u32.into();
        let raw: u32 = g.into();
        assert_eq!(raw, 7);
        assert!(!g.is_none());
        assert!(WorkgroupId::default().is_none());
    }
}
