//! SQLite-backed job and cron schedule store
//!
//! One database file holds both the `background_jobs` queue and the
//! `cron_schedules` table. `SqliteStore` implements both `JobStore` and
//! `CronScheduleStore`.
//!
//! Key features:
//! - Atomic claims inside `BEGIN IMMEDIATE` transactions
//! - Guarded state transitions (status checked in every `UPDATE`)
//! - CHECK constraints on status, priority and progress
//! - WAL mode for concurrent readers

mod jobs;
mod rows;
mod schedules;
pub mod schema;
pub mod store;
pub mod txn;

pub use store::SqliteStore;
pub use txn::WriteTxn;
