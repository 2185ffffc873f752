use crate::error::{ConveyorError, Result};
use crate::types::job::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named, persisted template that spawns jobs on a cron recurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub id: String,
    /// Unique; the idempotency key across process restarts.
    pub name: String,
    pub job_type: String,
    /// 5-field cron expression.
    pub cron_expression: String,
    /// Template copied into each generated job.
    pub payload: Value,
    pub priority: u8,
    pub max_attempts: u32,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A statically declared schedule, inserted at bootstrap if absent.
#[derive(Debug, Clone)]
pub struct ScheduleDefinition {
    pub name: String,
    pub job_type: String,
    pub cron_expression: String,
    pub payload: Value,
    pub priority: i32,
    pub max_attempts: u32,
    pub enabled: bool,
}

impl ScheduleDefinition {
    pub fn new(
        name: impl Into<String>,
        job_type: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            job_type: job_type.into(),
            cron_expression: cron_expression.into(),
            payload: Value::Object(Default::default()),
            priority: DEFAULT_PRIORITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            enabled: true,
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Insert the schedule disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check the fields that do not need the cron parser.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConveyorError::InvalidJob("schedule name must not be empty".into()));
        }
        if self.job_type.trim().is_empty() {
            return Err(ConveyorError::InvalidJob(format!(
                "schedule '{}' has an empty job type",
                self.name
            )));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(ConveyorError::InvalidJob(format!(
                "schedule '{}' priority {} outside [{MIN_PRIORITY}, {MAX_PRIORITY}]",
                self.name, self.priority
            )));
        }
        if self.max_attempts < 1 {
            return Err(ConveyorError::InvalidJob(format!(
                "schedule '{}' max_attempts must be at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Outcome of an insert-if-absent-by-name.
#[derive(Debug, Clone)]
pub struct ScheduleInsert {
    /// The persisted row: the new one, or the one that already existed.
    pub schedule: CronSchedule,
    pub created: bool,
}
