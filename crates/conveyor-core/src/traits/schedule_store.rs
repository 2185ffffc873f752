use crate::error::Result;
use crate::types::{CronSchedule, ScheduleDefinition, ScheduleInsert};
use chrono::{DateTime, Utc};

/// Durable table of named recurring schedules
///
/// Rows are keyed by a unique name so bootstrapping the same definitions on
/// every process start never duplicates them. Normal operation never deletes
/// a row; schedules are only disabled.
pub trait CronScheduleStore: Send + Sync {
    /// Insert `definition` with `next_run` unless a schedule with the same
    /// name exists. An existing row is returned untouched.
    fn create_if_absent(
        &self,
        definition: &ScheduleDefinition,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<ScheduleInsert>;

    /// Get a schedule by name.
    fn get_schedule(&self, name: &str) -> Result<Option<CronSchedule>>;

    /// List all schedules ordered by name.
    fn list_schedules(&self) -> Result<Vec<CronSchedule>>;

    /// Enabled schedules whose `next_run <= now`, earliest first.
    fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<CronSchedule>>;

    /// Advance a schedule after it spawned a job.
    fn record_run(
        &self,
        schedule_id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Enable or disable a schedule. When `next_run` is given it replaces the
    /// stored one. Returns false if no schedule has that name.
    fn set_enabled(
        &self,
        name: &str,
        enabled: bool,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<bool>;
}
