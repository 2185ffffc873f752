//! Conveyor Scheduler
//!
//! Executes jobs persisted by a [`conveyor_core::JobStore`] and feeds it from
//! cron schedules.
//!
//! # Overview
//!
//! - [`JobProcessor`]: polls the store, claims due jobs up to a concurrency
//!   budget and runs each through the handler registered for its type
//! - [`CronScheduler`]: enqueues one job each time a persisted schedule is due
//! - [`BatchOutcome`]: partial-failure tally for handlers that fan out over
//!   several sources
//!
//! Handler outcomes drive the job state machine: `Ok` completes the job,
//! `Err` or a panic fails it, and the store decides between retry with
//! backoff and terminal failure.
//!
//! # Example
//!
//! ```ignore
//! use conveyor_scheduler::prelude::*;
//! use conveyor_sqlite::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(SqliteStore::open(StoreConfig::new("./data/jobs.db"))?);
//!
//!     let processor = JobProcessor::new(store.clone(), ProcessorConfig::default())
//!         .with_handler("fetch_news", handler_fn(|job, progress| async move {
//!             progress.report(50)?;
//!             Ok(serde_json::json!({ "source": job.payload["source"] }))
//!         }));
//!     processor.start()?;
//!
//!     let cron = CronScheduler::new(store.clone(), store.clone(), CronConfig::default());
//!     cron.bootstrap(&[ScheduleDefinition::new("hourly_news", "fetch_news", "0 * * * *")])?;
//!     cron.start()?;
//!
//!     store.enqueue(NewJob::new("fetch_news", serde_json::json!({ "source": "rss" })))?;
//!     processor.trigger();
//!
//!     tokio::signal::ctrl_c().await?;
//!     cron.stop().await;
//!     processor.stop().await;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod cron;
pub mod handler;
pub mod processor;
mod runner;

pub mod prelude;

pub use batch::BatchOutcome;
pub use config::{CronConfig, ProcessorConfig};
pub use cron::{BootstrapReport, CronScheduler};
pub use handler::{handler_fn, FnHandler, HandlerRegistry, JobHandler, ProgressReporter};
pub use processor::JobProcessor;
