//! Shared sizing constants

/// Upper bound on worker count. `WorkerId` reserves its top two values as
/// sentinels (`NONE`, `EXTERNAL`), but in practice the pool is sized to the
/// host's core count; this bound exists to keep inbox arrays and dequeue
/// scans on the stack-friendly side.
pub const MAX_WORKERS: usize = 1024;

/// Upper bound on concurrently registered workgroups.
pub const MAX_WORKGROUPS: usize = 256;
