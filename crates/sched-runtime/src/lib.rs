//! # sched-runtime
//!
//! The worker pool, per-(worker, group) inboxes, and the `Scheduler`
//! handle that ties them together.

#[macro_use]
extern crate sched_core;

pub mod config;
pub mod inbox;
pub mod parking;
pub mod scheduler;
pub mod tls;
pub mod work_item;
pub mod worker;
pub mod workgroup;

pub use config::SchedulerConfig;
pub use scheduler::{Scheduler, WorkerContext};
pub use work_item::WorkItem;
pub use worker::{current_worker, set_current_worker};
pub use workgroup::Workgroup;
