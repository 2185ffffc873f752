use crate::error::Result;
use crate::types::{FailOutcome, Job, JobCounts, JobFilter, NewJob, RecoveryReport};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Durable job queue
///
/// The store is the single source of truth for job state and the only
/// writer of job rows. Every mutation is a guarded state transition:
/// - `pending -> running` via [`claim_next`](JobStore::claim_next)
/// - `running -> completed` via [`complete`](JobStore::complete)
/// - `running -> pending | failed` via [`fail`](JobStore::fail)
///
/// Transitions out of `completed` or `failed` are rejected with
/// `ConveyorError::InvalidState`.
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job. Rejects priorities outside `[1, 10]`.
    fn enqueue(&self, job: NewJob) -> Result<Job>;

    /// Atomically claim up to `limit` due jobs, highest priority first and
    /// oldest first among equals, moving them to `running`.
    ///
    /// No job is ever returned to two callers.
    fn claim_next(&self, limit: usize) -> Result<Vec<Job>>;

    /// Record handler progress, clamped to `[0, 100]` and never lowered.
    /// Returns the stored value.
    fn update_progress(&self, job_id: &str, progress: i64) -> Result<u8>;

    /// `running -> completed` with `result` and `progress = 100`.
    fn complete(&self, job_id: &str, result: Value) -> Result<Job>;

    /// Retry with backoff while attempts remain, otherwise fail terminally.
    fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome>;

    /// Route jobs left `running` for longer than `stale_after` through
    /// [`fail`](JobStore::fail).
    fn recover_stuck(&self, stale_after: Duration) -> Result<RecoveryReport>;

    /// Get a job by ID.
    fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// List jobs, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Count jobs per status.
    fn counts(&self) -> Result<JobCounts>;

    /// Delete terminal jobs that finished before `before`.
    fn purge_finished(&self, before: DateTime<Utc>) -> Result<usize>;
}
