//! Optional metrics instrumentation for conveyor.
//!
//! When the `observe` feature is enabled, the processor and cron scheduler
//! emit counters, histograms, and gauges via the [`metrics`] crate. A
//! downstream application must install a metrics recorder (e.g.
//! `metrics-exporter-prometheus`) to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record jobs claimed by one poll tick.
///
/// - `conveyor.jobs.claimed_total` – counter
#[inline]
pub fn record_claimed(count: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("conveyor.jobs.claimed_total").increment(count as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}

/// Record a finished handler invocation.
///
/// - `conveyor.jobs.outcome_total` – counter with `outcome` label
///   (`completed` / `retrying` / `failed`)
/// - `conveyor.jobs.duration_seconds` – histogram with `job_type` label
#[inline]
pub fn record_job_outcome(job_type: &str, outcome: &'static str, duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("conveyor.jobs.outcome_total", "outcome" => outcome).increment(1);
        metrics::histogram!("conveyor.jobs.duration_seconds", "job_type" => job_type.to_string())
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (job_type, outcome, duration);
    }
}

/// Set the number of in-flight handlers.
///
/// - `conveyor.jobs.active` – gauge
#[inline]
pub fn set_active_jobs(count: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("conveyor.jobs.active").set(count as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}

/// Record jobs requeued or failed by a stuck-job sweep.
///
/// - `conveyor.jobs.recovered_total` – counter
#[inline]
pub fn record_recovered(count: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("conveyor.jobs.recovered_total").increment(count as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}

/// Record a cron schedule spawning a job.
///
/// - `conveyor.cron.fired_total` – counter with `schedule` label
#[inline]
pub fn record_cron_fired(schedule: &str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("conveyor.cron.fired_total", "schedule" => schedule.to_string())
            .increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = schedule;
    }
}
