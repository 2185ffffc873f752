pub mod job;
pub mod schedule;

pub use job::{
    FailOutcome, Job, JobCounts, JobFilter, JobStatus, NewJob, RecoveryReport, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_PRIORITY, MAX_DELAY, MAX_PRIORITY, MIN_PRIORITY,
};
pub use schedule::{CronSchedule, ScheduleDefinition, ScheduleInsert};
