//! Conveyor CLI - inspect and maintain a conveyor job database

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conveyor_core::StoreConfig;
use conveyor_sqlite::SqliteStore;
use std::path::{Path, PathBuf};

mod commands;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the job database file
    #[arg(short, long, default_value = "./data/conveyor.db")]
    db_path: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Job counts per status and the schedule table
    Status,

    /// Inspect jobs
    #[command(subcommand)]
    Jobs(JobsCommands),

    /// Enqueue a job
    Enqueue {
        /// Job type (handler key)
        job_type: String,

        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,

        /// Priority from 1 (lowest) to 10 (highest)
        #[arg(long, default_value_t = 5)]
        priority: i32,

        /// Attempts before the job fails permanently
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,

        /// Correlation key to a higher-level entity
        #[arg(long)]
        project_id: Option<String>,

        /// Seconds to wait before the job becomes claimable
        #[arg(long)]
        delay_secs: Option<u64>,
    },

    /// Requeue or fail jobs left running by a dead process
    Recover {
        /// Jobs running for longer than this are considered orphaned
        #[arg(long, default_value_t = 15 * 60)]
        stale_after_secs: u64,
    },

    /// Delete completed and failed jobs
    Purge {
        /// Only delete jobs that finished more than this many days ago
        #[arg(long)]
        older_than_days: u32,
    },

    /// Manage cron schedules
    #[command(subcommand)]
    Schedules(ScheduleCommands),
}

#[derive(Subcommand)]
enum JobsCommands {
    /// List jobs, newest first
    List {
        /// Filter by status (pending, running, completed, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by job type
        #[arg(short, long)]
        job_type: Option<String>,

        /// Filter by project id
        #[arg(long)]
        project_id: Option<String>,

        /// Maximum number of jobs to show
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show one job in full
    Show {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// List all schedules
    List,

    /// Enable a schedule; its next run is recomputed from now
    Enable {
        /// Schedule name
        name: String,
    },

    /// Disable a schedule
    Disable {
        /// Schedule name
        name: String,
    },
}

fn open_store(db_path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(StoreConfig::new(db_path))
        .with_context(|| format!("Failed to open job database at {}", db_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let store = open_store(&cli.db_path)?;

    match cli.command {
        Commands::Status => commands::status::execute(&store, &cli.db_path)?,
        Commands::Jobs(JobsCommands::List {
            status,
            job_type,
            project_id,
            limit,
        }) => commands::jobs::list(&store, status, job_type, project_id, limit)?,
        Commands::Jobs(JobsCommands::Show { id }) => commands::jobs::show(&store, &id)?,
        Commands::Enqueue {
            job_type,
            payload,
            priority,
            max_attempts,
            project_id,
            delay_secs,
        } => commands::jobs::enqueue(
            &store,
            commands::jobs::EnqueueArgs {
                job_type,
                payload,
                priority,
                max_attempts,
                project_id,
                delay_secs,
            },
        )?,
        Commands::Recover { stale_after_secs } => {
            commands::maintenance::recover(&store, stale_after_secs)?
        }
        Commands::Purge { older_than_days } => {
            commands::maintenance::purge(&store, older_than_days)?
        }
        Commands::Schedules(ScheduleCommands::List) => commands::schedules::list(&store)?,
        Commands::Schedules(ScheduleCommands::Enable { name }) => {
            commands::schedules::set_enabled(store, &name, true)?
        }
        Commands::Schedules(ScheduleCommands::Disable { name }) => {
            commands::schedules::set_enabled(store, &name, false)?
        }
    }

    Ok(())
}
