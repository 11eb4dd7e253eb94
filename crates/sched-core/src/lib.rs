//! # sched-core
//!
//! Platform-agnostic types shared by the task scheduler: identifiers,
//! errors, a spinlock for short internal critical sections, and the
//! `kprint` debug logging facility.

pub mod constants;
pub mod env;
pub mod error;
pub mod id;
#[macro_use]
pub mod kprint;
pub mod spinlock;

pub use error::{SchedError, SchedResult};
pub use id::{WorkerId, WorkgroupId};
pub use spinlock::{SpinLock, SpinLockGuard};

pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
pub use kprint::LogLevel;
