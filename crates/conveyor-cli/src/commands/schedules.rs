//! Cron schedule commands

use super::format_time;
use anyhow::{bail, Context, Result};
use conveyor_core::CronScheduleStore;
use conveyor_scheduler::{CronConfig, CronScheduler};
use conveyor_sqlite::SqliteStore;
use std::sync::Arc;

pub fn list(store: &SqliteStore) -> Result<()> {
    let schedules = store
        .list_schedules()
        .context("Failed to list schedules")?;

    if schedules.is_empty() {
        println!("No schedules found");
        return Ok(());
    }

    println!(
        "{:<24} {:<20} {:<16} {:<8} {:<19}  {}",
        "Name", "Job Type", "Cron", "Enabled", "Last Run", "Next Run"
    );
    println!("{}", "=".repeat(110));
    for schedule in &schedules {
        println!(
            "{:<24} {:<20} {:<16} {:<8} {:<19}  {}",
            schedule.name,
            schedule.job_type,
            schedule.cron_expression,
            if schedule.enabled { "yes" } else { "no" },
            format_time(schedule.last_run),
            format_time(schedule.next_run)
        );
    }
    println!("\nTotal: {} schedule(s)", schedules.len());

    Ok(())
}

pub fn set_enabled(store: SqliteStore, name: &str, enabled: bool) -> Result<()> {
    let store = Arc::new(store);
    let scheduler = CronScheduler::new(store.clone(), store.clone(), CronConfig::default());

    let found = scheduler
        .set_enabled(name, enabled)
        .with_context(|| format!("Failed to update schedule {name}"))?;
    if !found {
        bail!("Schedule not found: {name}");
    }

    let schedule = store
        .get_schedule(name)
        .context("Failed to reload schedule")?
        .with_context(|| format!("Schedule not found: {name}"))?;
    println!(
        "✓ Schedule {} {} (next run: {})",
        schedule.name,
        if enabled { "enabled" } else { "disabled" },
        format_time(schedule.next_run)
    );

    Ok(())
}
