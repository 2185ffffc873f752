use chrono::Utc;
use conveyor_core::error::{ConveyorError, Result};
use rusqlite::Connection;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS engine_meta (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    schema_version INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS background_jobs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    priority INTEGER NOT NULL DEFAULT 5 CHECK (priority BETWEEN 1 AND 10),
    payload TEXT NOT NULL,
    result TEXT,
    progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
    attempt INTEGER NOT NULL DEFAULT 1 CHECK (attempt >= 1),
    max_attempts INTEGER NOT NULL DEFAULT 3 CHECK (max_attempts >= 1),
    project_id TEXT,
    scheduled_for INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    last_error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (attempt <= max_attempts)
);

CREATE INDEX IF NOT EXISTS idx_background_jobs_claim
    ON background_jobs(status, priority DESC, created_at, seq);

CREATE INDEX IF NOT EXISTS idx_background_jobs_due
    ON background_jobs(status, scheduled_for);

CREATE INDEX IF NOT EXISTS idx_background_jobs_project
    ON background_jobs(project_id);

CREATE TABLE IF NOT EXISTS cron_schedules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    job_type TEXT NOT NULL,
    cron_expression TEXT NOT NULL,
    payload TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 5 CHECK (priority BETWEEN 1 AND 10),
    max_attempts INTEGER NOT NULL DEFAULT 3 CHECK (max_attempts >= 1),
    enabled INTEGER NOT NULL DEFAULT 1,
    last_run INTEGER,
    next_run INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cron_schedules_due
    ON cron_schedules(enabled, next_run);
"#;

/// Create tables and indexes if missing and record the schema version.
///
/// Refuses to open a database written by a newer schema.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| ConveyorError::Database(e.to_string()))?;

    conn.execute(
        "INSERT OR IGNORE INTO engine_meta (id, schema_version, updated_at) VALUES (0, ?1, ?2)",
        [SCHEMA_VERSION as i64, Utc::now().timestamp_millis()],
    )
    .map_err(|e| ConveyorError::Database(e.to_string()))?;

    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(ConveyorError::InvalidState(format!(
            "database schema version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }

    if current < SCHEMA_VERSION {
        update_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Read the stored schema version.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT schema_version FROM engine_meta WHERE id = 0",
        [],
        |row| {
            let v: i64 = row.get(0)?;
            Ok(v as u32)
        },
    )
    .map_err(|e| ConveyorError::Database(e.to_string()))
}

fn update_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "UPDATE engine_meta SET schema_version = ?1, updated_at = ?2 WHERE id = 0",
        [version as i64, Utc::now().timestamp_millis()],
    )
    .map_err(|e| ConveyorError::Database(e.to_string()))?;

    Ok(())
}
