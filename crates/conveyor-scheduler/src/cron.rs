//! Cron scheduler: turns due schedules into jobs.

use crate::config::CronConfig;
use crate::runner::{LoopControl, LoopSignal};
use chrono::{DateTime, Utc};
use conveyor_core::{
    error::Result, observe, CronExpression, CronSchedule, CronScheduleStore, JobStore, NewJob,
    ScheduleDefinition,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of [`CronScheduler::bootstrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Schedules inserted by this call.
    pub created: Vec<String>,
    /// Schedules that were already persisted and left untouched.
    pub existing: Vec<String>,
}

/// Evaluates persisted cron schedules and enqueues one job per due schedule.
///
/// Missed periods are not backfilled: a schedule that was due several times
/// while the process was down fires once and advances to its next
/// occurrence after now.
pub struct CronScheduler {
    inner: Arc<Inner>,
    control: LoopControl,
}

struct Inner {
    schedules: Arc<dyn CronScheduleStore>,
    jobs: Arc<dyn JobStore>,
    config: CronConfig,
}

impl CronScheduler {
    pub fn new(
        schedules: Arc<dyn CronScheduleStore>,
        jobs: Arc<dyn JobStore>,
        config: CronConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                schedules,
                jobs,
                config,
            }),
            control: LoopControl::new("cron-scheduler"),
        }
    }

    /// Persist `definitions` that do not exist yet.
    ///
    /// Safe to call on every process start: existing rows keep their
    /// enabled flag and run times.
    pub fn bootstrap(&self, definitions: &[ScheduleDefinition]) -> Result<BootstrapReport> {
        let now = Utc::now();
        let mut report = BootstrapReport::default();

        for definition in definitions {
            let expression = CronExpression::parse(&definition.cron_expression)?;
            let insert = self
                .inner
                .schedules
                .create_if_absent(definition, expression.next_after(now))?;

            if insert.created {
                report.created.push(insert.schedule.name);
            } else {
                report.existing.push(insert.schedule.name);
            }
        }

        info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Cron schedules bootstrapped"
        );
        Ok(report)
    }

    /// Fire every schedule due at `now`. Returns the number of jobs enqueued.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.tick(now)
    }

    /// Enable or disable a schedule by name. Enabling recomputes `next_run`
    /// from now. Returns false if no schedule has that name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let Some(schedule) = self.inner.schedules.get_schedule(name)? else {
            return Ok(false);
        };

        let next_run = if enabled {
            CronExpression::parse(&schedule.cron_expression)?.next_after(Utc::now())
        } else {
            None
        };

        self.inner.schedules.set_enabled(name, enabled, next_run)
    }

    /// Spawn the tick loop. Returns `AlreadyRunning` if it is alive.
    pub fn start(&self) -> Result<()> {
        self.control
            .start(|| Ok(()), |signal| run_loop(self.inner.clone(), signal))?;

        info!(
            tick_interval_ms = self.inner.config.tick_interval.as_millis() as u64,
            "Cron scheduler started"
        );
        Ok(())
    }

    /// Stop the tick loop and wait for it to exit.
    pub async fn stop(&self) {
        self.control.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }
}

impl Inner {
    fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.schedules.due_schedules(now)?;
        let mut fired = 0;

        for schedule in due {
            match self.fire(&schedule, now) {
                Ok(()) => fired += 1,
                Err(e) => warn!(
                    schedule = %schedule.name,
                    cron = %schedule.cron_expression,
                    error = %e,
                    "Skipping cron schedule"
                ),
            }
        }

        if fired > 0 {
            debug!(fired, "Cron tick");
        }
        Ok(fired)
    }

    fn fire(&self, schedule: &CronSchedule, now: DateTime<Utc>) -> Result<()> {
        let expression = CronExpression::parse(&schedule.cron_expression)?;

        // Enqueue before advancing: a crash in between duplicates at most one job.
        let job = self.jobs.enqueue(
            NewJob::new(schedule.job_type.clone(), schedule.payload.clone())
                .priority(i32::from(schedule.priority))
                .max_attempts(schedule.max_attempts),
        )?;

        let next_run = expression.next_after(now);
        self.schedules.record_run(&schedule.id, now, next_run)?;

        observe::record_cron_fired(&schedule.name);
        info!(
            schedule = %schedule.name,
            job.id = %job.id,
            next_run = ?next_run,
            "Cron schedule fired"
        );
        Ok(())
    }
}

async fn run_loop(inner: Arc<Inner>, signal: LoopSignal) {
    while !signal.is_shutdown() {
        if let Err(e) = inner.tick(Utc::now()) {
            error!(error = %e, "Cron tick failed");
        }
        signal.sleep(inner.config.tick_interval).await;
    }

    info!("Cron scheduler stopped");
}
