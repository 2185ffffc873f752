//! Job inspection and enqueue commands

use super::format_time;
use anyhow::{Context, Result};
use conveyor_core::{JobFilter, JobStatus, JobStore, NewJob};
use conveyor_sqlite::SqliteStore;
use std::time::Duration;

pub struct EnqueueArgs {
    pub job_type: String,
    pub payload: String,
    pub priority: i32,
    pub max_attempts: u32,
    pub project_id: Option<String>,
    pub delay_secs: Option<u64>,
}

pub fn list(
    store: &SqliteStore,
    status: Option<String>,
    job_type: Option<String>,
    project_id: Option<String>,
    limit: usize,
) -> Result<()> {
    let mut filter = JobFilter::new().limit(limit);
    if let Some(status) = status {
        let status: JobStatus = status.parse().context("Invalid --status")?;
        filter = filter.status(status);
    }
    if let Some(job_type) = job_type {
        filter = filter.job_type(job_type);
    }
    if let Some(project_id) = project_id {
        filter = filter.project_id(project_id);
    }

    let jobs = store.list(&filter).context("Failed to list jobs")?;
    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20} {:<10} {:>3} {:>4} {:>7}  {}",
        "ID", "Type", "Status", "Pri", "Prog", "Attempt", "Created"
    );
    println!("{}", "=".repeat(110));
    for job in &jobs {
        println!(
            "{:<36}  {:<20} {:<10} {:>3} {:>3}% {:>7}  {}",
            job.id,
            job.job_type,
            job.status,
            job.priority,
            job.progress,
            format!("{}/{}", job.attempt, job.max_attempts),
            format_time(Some(job.created_at))
        );
    }
    println!("\nTotal: {} job(s)", jobs.len());

    Ok(())
}

pub fn show(store: &SqliteStore, id: &str) -> Result<()> {
    let job = store
        .get(id)
        .context("Failed to load job")?
        .with_context(|| format!("Job not found: {id}"))?;

    println!("\nJob {}", job.id);
    println!("{}", "=".repeat(60));
    println!("Type:          {}", job.job_type);
    println!("Status:        {}", job.status);
    println!("Priority:      {}", job.priority);
    println!("Progress:      {}%", job.progress);
    println!("Attempt:       {}/{}", job.attempt, job.max_attempts);
    if let Some(project_id) = &job.project_id {
        println!("Project:       {}", project_id);
    }
    println!("Scheduled For: {}", format_time(Some(job.scheduled_for)));
    println!("Started:       {}", format_time(job.started_at));
    println!("Completed:     {}", format_time(job.completed_at));
    println!("Created:       {}", format_time(Some(job.created_at)));
    println!("Updated:       {}", format_time(Some(job.updated_at)));
    if let Some(error) = &job.last_error {
        println!("Last Error:    {}", error);
    }

    println!("\nPayload:");
    println!("{}", serde_json::to_string_pretty(&job.payload)?);
    if let Some(result) = &job.result {
        println!("\nResult:");
        println!("{}", serde_json::to_string_pretty(result)?);
    }

    Ok(())
}

pub fn enqueue(store: &SqliteStore, args: EnqueueArgs) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&args.payload).context("Payload is not valid JSON")?;

    let mut job = NewJob::new(args.job_type, payload)
        .priority(args.priority)
        .max_attempts(args.max_attempts);
    if let Some(project_id) = args.project_id {
        job = job.project_id(project_id);
    }
    if let Some(secs) = args.delay_secs {
        job = job.delay(Duration::from_secs(secs));
    }

    let job = store.enqueue(job).context("Failed to enqueue job")?;
    tracing::info!(job.id = %job.id, job.type = %job.job_type, "Job enqueued");
    println!("✓ Enqueued job {}", job.id);

    Ok(())
}
