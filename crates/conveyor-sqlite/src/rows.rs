//! Row mapping and timestamp helpers.
//!
//! Timestamps are stored as Unix milliseconds; JSON columns as TEXT.

use chrono::{DateTime, Utc};
use conveyor_core::{CronSchedule, ConveyorError, Job, JobStatus};
use rusqlite::types::Type;
use rusqlite::Row;

pub(crate) const JOB_COLUMNS: &str = "id, job_type, status, priority, payload, result, progress, \
     attempt, max_attempts, project_id, scheduled_for, started_at, completed_at, created_at, \
     updated_at, last_error";

pub(crate) const SCHEDULE_COLUMNS: &str = "id, name, job_type, cron_expression, payload, \
     priority, max_attempts, enabled, last_run, next_run, created_at";

pub(crate) fn db_err(e: rusqlite::Error) -> ConveyorError {
    ConveyorError::Database(e.to_string())
}

/// Current time truncated to the stored millisecond precision.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn to_datetime(millis: i64) -> conveyor_core::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ConveyorError::Database(format!("timestamp {millis} out of range")))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {millis} out of range").into(),
        )
    })
}

fn opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status: String = row.get(2)?;
    let status = status
        .parse::<JobStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Job {
        id: row.get(0)?,
        job_type: row.get(1)?,
        status,
        priority: row.get(3)?,
        payload: row.get(4)?,
        result: row.get(5)?,
        progress: row.get(6)?,
        attempt: row.get(7)?,
        max_attempts: row.get(8)?,
        project_id: row.get(9)?,
        scheduled_for: timestamp(row, 10)?,
        started_at: opt_timestamp(row, 11)?,
        completed_at: opt_timestamp(row, 12)?,
        created_at: timestamp(row, 13)?,
        updated_at: timestamp(row, 14)?,
        last_error: row.get(15)?,
    })
}

pub(crate) fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<CronSchedule> {
    Ok(CronSchedule {
        id: row.get(0)?,
        name: row.get(1)?,
        job_type: row.get(2)?,
        cron_expression: row.get(3)?,
        payload: row.get(4)?,
        priority: row.get(5)?,
        max_attempts: row.get(6)?,
        enabled: row.get(7)?,
        last_run: opt_timestamp(row, 8)?,
        next_run: opt_timestamp(row, 9)?,
        created_at: timestamp(row, 10)?,
    })
}
