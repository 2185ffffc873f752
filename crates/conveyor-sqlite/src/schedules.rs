//! `CronScheduleStore` implementation.

use chrono::{DateTime, Utc};
use conveyor_core::{
    error::{ConveyorError, Result},
    CronSchedule, CronScheduleStore, ScheduleDefinition, ScheduleInsert,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::rows::{db_err, now_millis, schedule_from_row, SCHEDULE_COLUMNS};
use crate::store::SqliteStore;

fn fetch_by_name(conn: &Connection, name: &str) -> Result<Option<CronSchedule>> {
    conn.query_row(
        &format!("SELECT {SCHEDULE_COLUMNS} FROM cron_schedules WHERE name = ?1"),
        params![name],
        schedule_from_row,
    )
    .optional()
    .map_err(db_err)
}

impl CronScheduleStore for SqliteStore {
    fn create_if_absent(
        &self,
        definition: &ScheduleDefinition,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<ScheduleInsert> {
        definition.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn().lock();

        // Existing rows keep their enabled flag and run times.
        let inserted = conn
            .execute(
                "INSERT INTO cron_schedules
                 (id, name, job_type, cron_expression, payload, priority, max_attempts,
                  enabled, last_run, next_run, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10)
                 ON CONFLICT(name) DO NOTHING",
                params![
                    id,
                    definition.name,
                    definition.job_type,
                    definition.cron_expression,
                    definition.payload,
                    definition.priority,
                    definition.max_attempts,
                    definition.enabled,
                    next_run.map(|t| t.timestamp_millis()),
                    now_millis(),
                ],
            )
            .map_err(db_err)?;

        let schedule = fetch_by_name(&conn, &definition.name)?.ok_or_else(|| {
            ConveyorError::NotFound(format!("schedule {}", definition.name))
        })?;

        if inserted == 1 {
            info!(
                schedule = %schedule.name,
                job.type = %schedule.job_type,
                cron = %schedule.cron_expression,
                "Created cron schedule"
            );
        } else {
            debug!(schedule = %schedule.name, "Cron schedule already exists");
        }

        Ok(ScheduleInsert {
            schedule,
            created: inserted == 1,
        })
    }

    fn get_schedule(&self, name: &str) -> Result<Option<CronSchedule>> {
        fetch_by_name(&self.conn().lock(), name)
    }

    fn list_schedules(&self) -> Result<Vec<CronSchedule>> {
        let conn = self.conn().lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM cron_schedules ORDER BY name ASC"
            ))
            .map_err(db_err)?;
        let schedules = stmt
            .query_map([], schedule_from_row)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(schedules)
    }

    fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<CronSchedule>> {
        let conn = self.conn().lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM cron_schedules
                 WHERE enabled = 1 AND next_run IS NOT NULL AND next_run <= ?1
                 ORDER BY next_run ASC, name ASC"
            ))
            .map_err(db_err)?;
        let schedules = stmt
            .query_map(params![now.timestamp_millis()], schedule_from_row)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(schedules)
    }

    fn record_run(
        &self,
        schedule_id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let changed = self
            .conn()
            .lock()
            .execute(
                "UPDATE cron_schedules SET last_run = ?1, next_run = ?2 WHERE id = ?3",
                params![
                    last_run.timestamp_millis(),
                    next_run.map(|t| t.timestamp_millis()),
                    schedule_id
                ],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(ConveyorError::NotFound(format!("schedule {schedule_id}")));
        }
        Ok(())
    }

    fn set_enabled(
        &self,
        name: &str,
        enabled: bool,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let changed = self
            .conn()
            .lock()
            .execute(
                "UPDATE cron_schedules
                 SET enabled = ?1, next_run = COALESCE(?2, next_run)
                 WHERE name = ?3",
                params![enabled, next_run.map(|t| t.timestamp_millis()), name],
            )
            .map_err(db_err)?;

        if changed > 0 {
            info!(schedule = %name, enabled, "Updated cron schedule");
        }
        Ok(changed > 0)
    }
}
