//! Recovery and retention commands

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use conveyor_core::JobStore;
use conveyor_sqlite::SqliteStore;
use std::time::Duration;

pub fn recover(store: &SqliteStore, stale_after_secs: u64) -> Result<()> {
    let report = store
        .recover_stuck(Duration::from_secs(stale_after_secs))
        .context("Failed to recover orphaned jobs")?;

    if report.is_empty() {
        println!("No orphaned jobs found");
        return Ok(());
    }

    for id in &report.requeued {
        println!("  requeued  {}", id);
    }
    for id in &report.failed {
        println!("  failed    {}", id);
    }
    println!(
        "\n✓ Recovered {} job(s): {} requeued, {} failed",
        report.total(),
        report.requeued.len(),
        report.failed.len()
    );

    Ok(())
}

/// `now` minus `days`, or an error when that is before the earliest representable time.
fn purge_cutoff(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(ChronoDuration::days(i64::from(days)))
        .with_context(|| format!("--older-than-days {} is out of range", days))
}

pub fn purge(store: &SqliteStore, older_than_days: u32) -> Result<()> {
    let cutoff = purge_cutoff(Utc::now(), older_than_days)?;
    let deleted = store
        .purge_finished(cutoff)
        .context("Failed to purge finished jobs")?;

    println!(
        "✓ Deleted {} finished job(s) completed before {}",
        deleted,
        cutoff.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}
