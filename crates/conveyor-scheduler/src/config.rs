//! Processor and cron scheduler configuration.

use std::time::Duration;

/// Configuration for the job processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum number of handlers running at once.
    pub max_concurrency: usize,
    /// How often to poll the store for due jobs.
    pub poll_interval: Duration,
    /// A job `running` for longer than this at startup is presumed orphaned.
    pub stale_after: Duration,
    /// Sweep orphaned jobs when the processor starts.
    pub recover_on_start: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            poll_interval: Duration::from_millis(1000),
            stale_after: Duration::from_secs(15 * 60),
            recover_on_start: true,
        }
    }
}

impl ProcessorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum concurrency. Zero is raised to one.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the staleness threshold for crash recovery.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Enable or disable the startup recovery sweep.
    pub fn with_recover_on_start(mut self, recover: bool) -> Self {
        self.recover_on_start = recover;
        self
    }
}

/// Configuration for the cron scheduler.
#[derive(Debug, Clone)]
pub struct CronConfig {
    /// How often schedules are evaluated.
    pub tick_interval: Duration,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
        }
    }
}

impl CronConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
