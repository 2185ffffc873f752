//! `JobStore` implementation.

use conveyor_core::{
    error::{ConveyorError, Result},
    FailOutcome, Job, JobCounts, JobFilter, JobStatus, JobStore, NewJob, RecoveryReport,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::rows::{db_err, job_from_row, now_millis, to_datetime, JOB_COLUMNS};
use crate::store::SqliteStore;

const ORPHANED_ERROR: &str = "job orphaned by previous process";

fn fetch_job(conn: &Connection, job_id: &str) -> Result<Option<Job>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM background_jobs WHERE id = ?1"),
        params![job_id],
        job_from_row,
    )
    .optional()
    .map_err(db_err)
}

fn fetch_status(conn: &Connection, job_id: &str) -> Result<Option<JobStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM background_jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;
    status.map(|s| s.parse()).transpose()
}

/// Explain why a guarded `UPDATE ... WHERE status = 'running'` touched no row.
fn not_running(conn: &Connection, job_id: &str, action: &str) -> ConveyorError {
    match fetch_status(conn, job_id) {
        Ok(Some(status)) => ConveyorError::InvalidState(format!(
            "cannot {action} job {job_id}: status is {status}, expected running"
        )),
        Ok(None) => ConveyorError::NotFound(format!("job {job_id}")),
        Err(e) => e,
    }
}

impl SqliteStore {
    /// The failure transition, run inside the caller's transaction.
    fn fail_in(&self, conn: &Connection, job_id: &str, error: &str, now: i64) -> Result<FailOutcome> {
        let row: Option<(String, u32, u32)> = conn
            .query_row(
                "SELECT status, attempt, max_attempts FROM background_jobs WHERE id = ?1",
                params![job_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(db_err)?;

        let Some((status, attempt, max_attempts)) = row else {
            return Err(ConveyorError::NotFound(format!("job {job_id}")));
        };
        let status: JobStatus = status.parse()?;
        if status != JobStatus::Running {
            return Err(ConveyorError::InvalidState(format!(
                "cannot fail job {job_id}: status is {status}, expected running"
            )));
        }

        if attempt < max_attempts {
            let delay = self.backoff().delay(attempt);
            let scheduled_for = i64::try_from(delay.as_millis())
                .ok()
                .and_then(|ms| now.checked_add(ms))
                .ok_or_else(|| ConveyorError::Database(format!("retry delay {delay:?} overflows")))?;
            let retry_at = to_datetime(scheduled_for)?;

            conn.execute(
                "UPDATE background_jobs
                 SET status = 'pending',
                     attempt = attempt + 1,
                     progress = 0,
                     scheduled_for = ?1,
                     started_at = NULL,
                     last_error = ?2,
                     updated_at = ?3
                 WHERE id = ?4 AND status = 'running'",
                params![scheduled_for, error, now, job_id],
            )
            .map_err(db_err)?;

            debug!(
                job.id = %job_id,
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Job rescheduled for retry"
            );

            Ok(FailOutcome::Retrying {
                attempt: attempt + 1,
                scheduled_for: retry_at,
            })
        } else {
            let result = json!({ "error": error });
            conn.execute(
                "UPDATE background_jobs
                 SET status = 'failed',
                     result = ?1,
                     last_error = ?2,
                     completed_at = ?3,
                     updated_at = ?3
                 WHERE id = ?4 AND status = 'running'",
                params![result, error, now, job_id],
            )
            .map_err(db_err)?;

            warn!(job.id = %job_id, attempt, "Job failed permanently");

            Ok(FailOutcome::Failed)
        }
    }
}

impl JobStore for SqliteStore {
    fn enqueue(&self, job: NewJob) -> Result<Job> {
        job.validate()?;

        let now = now_millis();
        let id = uuid::Uuid::new_v4().to_string();
        let scheduled_for = job
            .scheduled_for
            .map(|t| t.timestamp_millis())
            .unwrap_or(now);

        let conn = self.conn().lock();
        conn.execute(
            "INSERT INTO background_jobs
             (id, job_type, status, priority, payload, progress, attempt, max_attempts,
              project_id, scheduled_for, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, ?4, 0, 1, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                job.job_type,
                job.priority,
                job.payload,
                job.max_attempts,
                job.project_id,
                scheduled_for,
                now,
            ],
        )
        .map_err(db_err)?;

        debug!(job.id = %id, job.type = %job.job_type, priority = job.priority, "Job enqueued");

        fetch_job(&conn, &id)?
            .ok_or_else(|| ConveyorError::NotFound(format!("job {id} vanished after insert")))
    }

    fn claim_next(&self, limit: usize) -> Result<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = now_millis();
        let txn = self.write_txn()?;

        let ids: Vec<String> = {
            let mut stmt = txn
                .prepare(
                    "SELECT id FROM background_jobs
                     WHERE status = 'pending' AND scheduled_for <= ?1
                     ORDER BY priority DESC, created_at ASC, seq ASC
                     LIMIT ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![now, limit as i64], |row| row.get(0))
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?
        };

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            let changed = txn
                .execute(
                    "UPDATE background_jobs
                     SET status = 'running', started_at = ?1, updated_at = ?1
                     WHERE id = ?2 AND status = 'pending'",
                    params![now, id],
                )
                .map_err(db_err)?;
            if changed == 1 {
                if let Some(job) = fetch_job(&txn, &id)? {
                    claimed.push(job);
                }
            }
        }

        txn.commit()?;
        Ok(claimed)
    }

    fn update_progress(&self, job_id: &str, progress: i64) -> Result<u8> {
        let progress = progress.clamp(0, 100);
        let conn = self.conn().lock();

        let changed = conn
            .execute(
                "UPDATE background_jobs
                 SET progress = MAX(progress, ?1), updated_at = ?2
                 WHERE id = ?3 AND status = 'running'",
                params![progress, now_millis(), job_id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(not_running(&conn, job_id, "update progress of"));
        }

        conn.query_row(
            "SELECT progress FROM background_jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    fn complete(&self, job_id: &str, result: Value) -> Result<Job> {
        let now = now_millis();
        let conn = self.conn().lock();

        let changed = conn
            .execute(
                "UPDATE background_jobs
                 SET status = 'completed',
                     result = ?1,
                     progress = 100,
                     completed_at = ?2,
                     updated_at = ?2
                 WHERE id = ?3 AND status = 'running'",
                params![result, now, job_id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(not_running(&conn, job_id, "complete"));
        }

        fetch_job(&conn, job_id)?.ok_or_else(|| ConveyorError::NotFound(format!("job {job_id}")))
    }

    fn fail(&self, job_id: &str, error: &str) -> Result<FailOutcome> {
        let txn = self.write_txn()?;
        let outcome = self.fail_in(&txn, job_id, error, now_millis())?;
        txn.commit()?;
        Ok(outcome)
    }

    fn recover_stuck(&self, stale_after: Duration) -> Result<RecoveryReport> {
        let now = now_millis();
        let cutoff = now.saturating_sub(i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX));
        let txn = self.write_txn()?;

        let stale: Vec<String> = {
            let mut stmt = txn
                .prepare(
                    "SELECT id FROM background_jobs
                     WHERE status = 'running' AND started_at < ?1
                     ORDER BY started_at ASC",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![cutoff], |row| row.get(0))
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?
        };

        let mut report = RecoveryReport::default();
        for id in stale {
            match self.fail_in(&txn, &id, ORPHANED_ERROR, now)? {
                FailOutcome::Retrying { .. } => report.requeued.push(id),
                FailOutcome::Failed => report.failed.push(id),
            }
        }

        txn.commit()?;

        if !report.is_empty() {
            info!(
                requeued = report.requeued.len(),
                failed = report.failed.len(),
                "Recovered orphaned jobs"
            );
        }
        Ok(report)
    }

    fn get(&self, job_id: &str) -> Result<Option<Job>> {
        fetch_job(&self.conn().lock(), job_id)
    }

    /// All filter values are passed as bound parameters.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut query = format!("SELECT {JOB_COLUMNS} FROM background_jobs WHERE 1=1");
        let mut bound_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bound_params.push(Box::new(status.as_str()));
        }

        if let Some(job_type) = &filter.job_type {
            query.push_str(" AND job_type = ?");
            bound_params.push(Box::new(job_type.clone()));
        }

        if let Some(project_id) = &filter.project_id {
            query.push_str(" AND project_id = ?");
            bound_params.push(Box::new(project_id.clone()));
        }

        query.push_str(" ORDER BY created_at DESC, seq DESC");

        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            bound_params.push(Box::new(limit as i64));
        }

        let conn = self.conn().lock();
        let mut stmt = conn.prepare(&query).map_err(db_err)?;
        let jobs = stmt
            .query_map(rusqlite::params_from_iter(bound_params.iter()), job_from_row)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(jobs)
    }

    fn counts(&self) -> Result<JobCounts> {
        let conn = self.conn().lock();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM background_jobs GROUP BY status")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;

        let mut counts = JobCounts::default();
        for row in rows {
            let (status, count) = row.map_err(db_err)?;
            counts.add(status.parse()?, count as u64);
        }
        Ok(counts)
    }

    fn purge_finished(&self, before: chrono::DateTime<chrono::Utc>) -> Result<usize> {
        let conn = self.conn().lock();
        let deleted = conn
            .execute(
                "DELETE FROM background_jobs
                 WHERE status IN ('completed', 'failed') AND completed_at < ?1",
                params![before.timestamp_millis()],
            )
            .map_err(db_err)?;

        if deleted > 0 {
            info!(deleted, "Purged finished jobs");
        }
        Ok(deleted)
    }
}
