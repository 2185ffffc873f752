use crate::error::{ConveyorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Lowest accepted job priority.
pub const MIN_PRIORITY: i32 = 1;
/// Highest accepted job priority.
pub const MAX_PRIORITY: i32 = 10;
/// Priority applied when the caller does not pick one.
pub const DEFAULT_PRIORITY: i32 = 5;
/// Attempt ceiling applied when the caller does not pick one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Longest delay accepted by [`NewJob::delay`]; longer delays are clamped.
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Lifecycle status of a job.
///
/// `Pending` and `Running` are the only non-terminal states. Nothing leaves
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ConveyorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ConveyorError::InvalidState(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// A persisted unit of asynchronous work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: u8,
    /// Opaque data handed to the handler unmodified.
    pub payload: Value,
    /// Handler output on success, `{"error": ..}` on terminal failure.
    pub result: Option<Value>,
    pub progress: u8,
    /// Current attempt number, starting at 1.
    pub attempt: u32,
    pub max_attempts: u32,
    pub project_id: Option<String>,
    /// Earliest time the job may be claimed.
    pub scheduled_for: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Most recent failure message, kept across retries.
    pub last_error: Option<String>,
}

impl Job {
    /// Whether a failure of the current attempt would be retried.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Request to enqueue a job.
///
/// ```
/// use conveyor_core::NewJob;
/// use serde_json::json;
///
/// let job = NewJob::new("rag_sync", json!({"project": "p1"}))
///     .priority(8)
///     .max_attempts(5);
/// assert!(job.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: Value,
    pub priority: i32,
    pub max_attempts: u32,
    /// `None` means immediately eligible.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>, payload: Value) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            priority: DEFAULT_PRIORITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scheduled_for: None,
            project_id: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    /// Delay eligibility by `delay` from now, clamped to [`MAX_DELAY`].
    pub fn delay(mut self, delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay.min(MAX_DELAY))
            .unwrap_or_else(|_| chrono::Duration::zero());
        let now = Utc::now();
        self.scheduled_for = Some(now.checked_add_signed(delay).unwrap_or(now));
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Check the insert-time invariants.
    pub fn validate(&self) -> Result<()> {
        if self.job_type.trim().is_empty() {
            return Err(ConveyorError::InvalidJob("job type must not be empty".into()));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(ConveyorError::InvalidJob(format!(
                "priority {} outside [{MIN_PRIORITY}, {MAX_PRIORITY}]",
                self.priority
            )));
        }
        if self.max_attempts < 1 {
            return Err(ConveyorError::InvalidJob(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Result of routing a running job through the failure transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Returned to `pending`, eligible again at `scheduled_for`.
    Retrying {
        attempt: u32,
        scheduled_for: DateTime<Utc>,
    },
    /// Attempts exhausted, now terminal.
    Failed,
}

impl FailOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Jobs touched by a stuck-job sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: Vec<String>,
    pub failed: Vec<String>,
}

impl RecoveryReport {
    pub fn total(&self) -> usize {
        self.requeued.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
    pub project_id: Option<String>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    pub(crate) fn slot(&mut self, status: JobStatus) -> &mut u64 {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
        }
    }

    /// Add `count` jobs of `status`.
    pub fn add(&mut self, status: JobStatus, count: u64) {
        *self.slot(status) += count;
    }

    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_job_defaults() {
        let job = NewJob::new("tts", json!({}));
        assert_eq!(job.priority, DEFAULT_PRIORITY);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.scheduled_for.is_none());
        assert!(job.project_id.is_none());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_priority_bounds() {
        assert!(NewJob::new("t", json!({})).priority(1).validate().is_ok());
        assert!(NewJob::new("t", json!({})).priority(10).validate().is_ok());
        assert!(NewJob::new("t", json!({})).priority(0).validate().is_err());
        assert!(NewJob::new("t", json!({})).priority(11).validate().is_err());
        assert!(NewJob::new("t", json!({})).priority(-3).validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempts_and_empty_type() {
        assert!(NewJob::new("t", json!({})).max_attempts(0).validate().is_err());
        assert!(NewJob::new("  ", json!({})).validate().is_err());
    }

    #[test]
    fn test_delay_sets_future_schedule() {
        let before = Utc::now();
        let job = NewJob::new("t", json!({})).delay(Duration::from_secs(60));
        assert!(job.scheduled_for.unwrap() >= before + chrono::Duration::seconds(60));
    }

    #[test]
    fn test_huge_delay_is_clamped() {
        let before = Utc::now();
        let job = NewJob::new("t", json!({})).delay(Duration::from_secs(100_000_000_000_000));
        let at = job.scheduled_for.unwrap();
        assert!(at > before + chrono::Duration::days(365 * 99));
        assert!(at <= Utc::now() + chrono::Duration::from_std(MAX_DELAY).unwrap());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_counts_total() {
        let mut counts = JobCounts::default();
        counts.add(JobStatus::Pending, 2);
        counts.add(JobStatus::Failed, 1);
        assert_eq!(counts.get(JobStatus::Pending), 2);
        assert_eq!(counts.total(), 3);
    }
}
