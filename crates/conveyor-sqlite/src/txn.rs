use conveyor_core::error::{ConveyorError, Result};
use parking_lot::MutexGuard;
use rusqlite::Connection;
use std::ops::Deref;

/// Write transaction holding the connection lock.
///
/// Opens with `BEGIN IMMEDIATE`, so the SQLite write lock is taken up front
/// and a concurrent writer (another process on the same file) waits on the
/// busy timeout instead of reading rows this transaction is about to claim.
/// Rolls back on drop unless committed.
pub struct WriteTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    in_txn: bool,
}

impl<'a> WriteTxn<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION")
            .map_err(|e| ConveyorError::Database(e.to_string()))?;

        Ok(Self { conn, in_txn: true })
    }

    pub fn commit(mut self) -> Result<()> {
        if self.in_txn {
            self.conn
                .execute_batch("COMMIT")
                .map_err(|e| ConveyorError::Database(e.to_string()))?;
            self.in_txn = false;
        }
        Ok(())
    }
}

impl<'a> Deref for WriteTxn<'a> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl<'a> Drop for WriteTxn<'a> {
    fn drop(&mut self) {
        if self.in_txn {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
