//! Convenience re-exports for common types.

pub use crate::batch::BatchOutcome;
pub use crate::config::{CronConfig, ProcessorConfig};
pub use crate::cron::{BootstrapReport, CronScheduler};
pub use crate::handler::{handler_fn, HandlerRegistry, JobHandler, ProgressReporter};
pub use crate::processor::JobProcessor;
pub use conveyor_core::{
    ConveyorError, Job, JobFilter, JobStatus, JobStore, NewJob, Result, ScheduleDefinition,
    StoreConfig,
};
