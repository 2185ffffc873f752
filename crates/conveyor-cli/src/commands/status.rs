//! Status command implementation

use super::format_time;
use anyhow::{Context, Result};
use conveyor_core::{CronScheduleStore, JobStatus, JobStore};
use conveyor_sqlite::SqliteStore;
use std::path::Path;

pub fn execute(store: &SqliteStore, db_path: &Path) -> Result<()> {
    tracing::info!("Checking job database status: {}", db_path.display());

    println!("\nJob Database Status");
    println!("{}", "=".repeat(60));
    println!("Path: {}", db_path.display());

    let schema_version = store
        .schema_version()
        .context("Failed to get schema version")?;
    println!("Schema Version: {}", schema_version);

    let counts = store.counts().context("Failed to count jobs")?;
    println!("\nJobs:");
    for status in JobStatus::ALL {
        println!("  {:<10} {}", status.as_str(), counts.get(status));
    }
    println!("  {:<10} {}", "total", counts.total());

    let schedules = store
        .list_schedules()
        .context("Failed to list schedules")?;
    println!("\nSchedules:");
    if schedules.is_empty() {
        println!("  (none)");
    }
    for schedule in schedules {
        println!(
            "  {:<24} {:<16} {:<8} next: {}",
            schedule.name,
            schedule.cron_expression,
            if schedule.enabled { "enabled" } else { "disabled" },
            format_time(schedule.next_run)
        );
    }

    if counts.running > 0 {
        println!(
            "\n{} job(s) running. Run 'conveyor recover' if their worker process is gone",
            counts.running
        );
    }

    Ok(())
}
