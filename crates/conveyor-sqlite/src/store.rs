use conveyor_core::{
    error::{ConveyorError, Result},
    BackoffPolicy, StoreConfig,
};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::sync::Arc;
use std::time::Duration;

use crate::schema;
use crate::txn::WriteTxn;

/// SQLite-backed job queue and schedule table
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    config: StoreConfig,
    backoff: BackoffPolicy,
}

impl SqliteStore {
    /// Open (or create) the database described by `cfg`.
    pub fn open(cfg: StoreConfig) -> Result<Self> {
        let conn = if cfg.is_in_memory() {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = cfg.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open_with_flags(
                &cfg.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            )
        }
        .map_err(|e| ConveyorError::Database(e.to_string()))?;

        Self::configure_connection(&conn, &cfg)?;
        schema::init(&conn)?;

        tracing::debug!(path = %cfg.path.display(), "Opened job store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            backoff: cfg.backoff.into(),
            config: cfg,
        })
    }

    /// Private in-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Get the underlying connection (for custom queries)
    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Backoff applied when a failed job is rescheduled.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Replace the backoff policy from the config.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn schema_version(&self) -> Result<u32> {
        schema::schema_version(&self.conn.lock())
    }

    pub(crate) fn write_txn(&self) -> Result<WriteTxn<'_>> {
        WriteTxn::new(self.conn.lock())
    }

    fn configure_connection(conn: &Connection, cfg: &StoreConfig) -> Result<()> {
        if cfg.wal_mode && !cfg.is_in_memory() {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| ConveyorError::Config(e.to_string()))?;
        }

        conn.pragma_update(None, "synchronous", cfg.synchronous.as_pragma())
            .map_err(|e| ConveyorError::Config(e.to_string()))?;

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| ConveyorError::Config(e.to_string()))?;

        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
            .map_err(|e| ConveyorError::Config(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        SqliteStore::open(StoreConfig::new(&path)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rejects_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        {
            let store = SqliteStore::open(StoreConfig::new(&path)).unwrap();
            store
                .conn()
                .lock()
                .execute("UPDATE engine_meta SET schema_version = 99 WHERE id = 0", [])
                .unwrap();
        }
        assert!(SqliteStore::open(StoreConfig::new(&path)).is_err());
    }
}
