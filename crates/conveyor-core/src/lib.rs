//! Conveyor Core: types, traits and policies for the background job engine
//!
//! This crate defines the abstractions shared by every other conveyor crate:
//! - Job and cron schedule records, plus the job state machine
//! - Store traits: `JobStore` (durable queue) and `CronScheduleStore`
//! - Retry backoff policy with jitter
//! - A 5-field cron dialect evaluated in UTC
//! - Configuration and optional metrics instrumentation
//!
//! Storage backends live in separate crates (see `conveyor-sqlite`); the
//! processor and cron scheduler live in `conveyor-scheduler`.

pub mod backoff;
pub mod config;
pub mod cron_expr;
pub mod error;
pub mod observe;
pub mod traits;
pub mod types;

pub use backoff::{BackoffPolicy, MAX_BACKOFF};
pub use config::{BackoffConfig, StoreConfig, SynchronousMode};
pub use cron_expr::CronExpression;
pub use error::{ConveyorError, Result};
pub use traits::{CronScheduleStore, JobStore};
pub use types::{
    CronSchedule, FailOutcome, Job, JobCounts, JobFilter, JobStatus, NewJob, RecoveryReport,
    ScheduleDefinition, ScheduleInsert,
};
