//! Job processor: the poll/claim/dispatch loop.

use crate::config::ProcessorConfig;
use crate::handler::{HandlerRegistry, JobHandler, ProgressReporter};
use crate::runner::{LoopControl, LoopSignal};
use conveyor_core::{error::Result, observe, FailOutcome, Job, JobStore};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runs claimed jobs through their registered handlers.
///
/// Each poll tick claims up to `max_concurrency - active` due jobs and
/// spawns one task per job. The loop never waits on handlers; `stop()`
/// waits for all of them.
pub struct JobProcessor {
    inner: Arc<Inner>,
    control: LoopControl,
}

struct Inner {
    store: Arc<dyn JobStore>,
    registry: RwLock<HandlerRegistry>,
    config: ProcessorConfig,
    active: AtomicUsize,
    tick_lock: Mutex<()>,
    signal: LoopSignal,
}

impl JobProcessor {
    pub fn new(store: Arc<dyn JobStore>, config: ProcessorConfig) -> Self {
        let control = LoopControl::new("job-processor");
        Self {
            inner: Arc::new(Inner {
                store,
                registry: RwLock::new(HandlerRegistry::new()),
                config,
                active: AtomicUsize::new(0),
                tick_lock: Mutex::new(()),
                signal: control.signal().clone(),
            }),
            control,
        }
    }

    /// Register a handler for `job_type`, replacing any previous one.
    pub fn register_handler(&self, job_type: impl Into<String>, handler: impl JobHandler + 'static) {
        self.inner
            .registry
            .write()
            .register(job_type, Arc::new(handler));
    }

    /// Builder-style [`register_handler`](Self::register_handler).
    pub fn with_handler(self, job_type: impl Into<String>, handler: impl JobHandler + 'static) -> Self {
        self.register_handler(job_type, handler);
        self
    }

    /// Remove the handler for `job_type`. Jobs of that type claimed later
    /// fail with a missing-handler error.
    pub fn unregister_handler(&self, job_type: &str) -> bool {
        self.inner.registry.write().unregister(job_type)
    }

    /// Recover orphaned jobs (if configured) and spawn the poll loop.
    ///
    /// Returns `AlreadyRunning` if the loop is alive or still draining after
    /// `stop()`. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let inner = self.inner.clone();
        self.control.start(
            || {
                if inner.config.recover_on_start {
                    let report = inner.store.recover_stuck(inner.config.stale_after)?;
                    observe::record_recovered(report.total());
                }
                Ok(())
            },
            |signal| run_loop(self.inner.clone(), signal),
        )?;

        info!(
            max_concurrency = self.inner.config.max_concurrency,
            poll_interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "Job processor started"
        );
        Ok(())
    }

    /// Stop polling and wait for every in-flight handler to finish.
    pub async fn stop(&self) {
        self.control.stop().await;
    }

    /// Wake the poll loop before its interval elapses.
    pub fn trigger(&self) {
        self.inner.signal.wake();
    }

    /// Run one poll iteration by hand. Returns the number of jobs dispatched.
    pub async fn tick(&self) -> Result<usize> {
        self.inner.tick()
    }

    /// True until the loop has exited and in-flight handlers have drained.
    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Number of handlers currently executing.
    pub fn active_job_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Job types with a registered handler, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        self.inner.registry.read().job_types()
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.config.max_concurrency
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.config.poll_interval
    }
}

impl Inner {
    fn tick(self: &Arc<Self>) -> Result<usize> {
        // Serialize ticks so two of them cannot both see the same free slots.
        let _tick = self.tick_lock.lock();

        let available = self
            .config
            .max_concurrency
            .saturating_sub(self.active.load(Ordering::SeqCst));
        if available == 0 {
            return Ok(0);
        }

        let jobs = self.store.claim_next(available)?;
        if jobs.is_empty() {
            return Ok(0);
        }

        let dispatched = jobs.len();
        observe::record_claimed(dispatched);
        debug!(count = dispatched, "Claimed jobs");

        for job in jobs {
            let handler = self.registry.read().get(&job.job_type);
            let slot = ActiveSlot::acquire(self.clone());
            tokio::spawn(run_job(self.store.clone(), handler, job, slot));
        }

        Ok(dispatched)
    }
}

async fn run_loop(inner: Arc<Inner>, signal: LoopSignal) {
    while !signal.is_shutdown() {
        if let Err(e) = inner.tick() {
            error!(error = %e, "Poll tick failed");
        }
        signal.sleep(inner.config.poll_interval).await;
    }

    let active = inner.active.load(Ordering::SeqCst);
    if active > 0 {
        info!(active, "Job processor stopping, waiting for running jobs");
    }
    while inner.active.load(Ordering::SeqCst) > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    info!("Job processor stopped");
}

/// One occupied concurrency slot. Released on drop, including on panic.
struct ActiveSlot {
    inner: Arc<Inner>,
}

impl ActiveSlot {
    fn acquire(inner: Arc<Inner>) -> Self {
        let active = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        observe::set_active_jobs(active);
        Self { inner }
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let active = self.inner.active.fetch_sub(1, Ordering::SeqCst) - 1;
        observe::set_active_jobs(active);
        // A slot just opened up.
        self.inner.signal.wake();
    }
}

async fn run_job(
    store: Arc<dyn JobStore>,
    handler: Option<Arc<dyn JobHandler>>,
    job: Job,
    _slot: ActiveSlot,
) {
    let span = info_span!(
        "job",
        job.id = %job.id,
        job.type = %job.job_type,
        attempt = job.attempt
    );

    async move {
        let started = Instant::now();

        let Some(handler) = handler else {
            let message = format!("no handler registered for job type `{}`", job.job_type);
            error!("{message}");
            record_failure(store.as_ref(), &job, &message, started);
            return;
        };

        debug!("Running job");
        let progress = ProgressReporter::new(store.clone(), job.id.clone());
        let result = AssertUnwindSafe(handler.handle(&job, progress))
            .catch_unwind()
            .await
            .map_err(|payload| panic_message(payload.as_ref()))
            .and_then(|result| result.map_err(|e| format!("{e:#}")));

        match result {
            Ok(value) => match store.complete(&job.id, value) {
                Ok(_) => {
                    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Job completed");
                    observe::record_job_outcome(&job.job_type, "completed", started.elapsed());
                }
                Err(e) => error!(error = %e, "Failed to record job completion"),
            },
            Err(message) => record_failure(store.as_ref(), &job, &message, started),
        }
    }
    .instrument(span)
    .await
}

fn record_failure(store: &dyn JobStore, job: &Job, message: &str, started: Instant) {
    match store.fail(&job.id, message) {
        Ok(FailOutcome::Retrying {
            attempt,
            scheduled_for,
        }) => {
            warn!(error = %message, next_attempt = attempt, %scheduled_for, "Job failed, retry scheduled");
            observe::record_job_outcome(&job.job_type, "retrying", started.elapsed());
        }
        Ok(FailOutcome::Failed) => {
            error!(error = %message, "Job failed permanently");
            observe::record_job_outcome(&job.job_type, "failed", started.elapsed());
        }
        Err(e) => error!(error = %e, "Failed to record job failure"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());

    match detail {
        Some(detail) => format!("handler panicked: {detail}"),
        None => "handler panicked".to_string(),
    }
}
