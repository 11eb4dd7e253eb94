//! Scheduler configuration

use sched_core::constants::MAX_WORKERS;

/// Configuration for a [`crate::scheduler::Scheduler`].
///
/// `worker_count` is fixed for the scheduler's lifetime: there is no
/// dynamic resizing of the pool once `begin_execution` has run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads (defaults to available parallelism).
    pub worker_count: usize,

    /// Inbox ring capacity per worker per group is
    /// `group.thread_count * work_scale`; this is the default
    /// `work_scale` used by `create_group` when the caller doesn't
    /// override it.
    pub default_work_scale: u32,

    /// Enable verbose `sdebug!`-level scheduler tracing.
    pub debug_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let num_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            worker_count: num_cpus.min(MAX_WORKERS),
            default_work_scale: 4,
            debug_logging: false,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.worker_count = n.min(MAX_WORKERS);
        self
    }

    pub fn default_work_scale(mut self, n: u32) -> Self {
        self.default_work_scale = n;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration before the scheduler is constructed.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1");
        }
        if self.worker_count > MAX_WORKERS {
            return Err("worker_count exceeds maximum");
        }
        if self.default_work_scale == 0 {
            return Err("default_work_scale must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = SchedulerConfig::new().worker_count(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn builder_chains() {
        let cfg = SchedulerConfig::new()
            .worker_count(8)
            .default_work_scale(2)
            .debug_logging(true);
        assert_eq!(cfg.worker_count, 8);
        assert_eq!(cfg.default_work_scale, 2);
        assert!(cfg.debug_logging);
    }
}
