//! # sched-task
//!
//! Coroutine tasks (`CoTask`, `CoSequence`) built on `std::future::Future`
//! and driven by the scheduler in `sched-runtime`, plus the
//! `sync_wait_result` bridge back to blocking code.

pub mod awaiter;
pub mod sync_wait;
pub mod task;

pub use sync_wait::sync_wait_result;
pub use task::{CoSequence, CoTask};
