//! Job handler trait and registry.

use async_trait::async_trait;
use conveyor_core::{error::Result, Job, JobStore};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Handle given to a running handler for reporting progress.
///
/// Progress is clamped to `[0, 100]` and never moves backwards; the
/// returned value is what the store now holds.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job_id: String,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Persist a progress percentage for this job.
    pub fn report(&self, percent: i64) -> Result<u8> {
        self.store.update_progress(&self.job_id, percent)
    }
}

/// Trait implemented by job handlers.
///
/// A handler receives the claimed job and returns the JSON result stored on
/// success. Returning `Err` (or panicking) routes the job through the retry
/// policy. The processor records the outcome; handlers never complete or
/// fail jobs themselves.
///
/// Jobs may run more than once after a crash, so handlers must be
/// idempotent.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job, progress: ProgressReporter) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job, ProgressReporter) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn handle(&self, job: &Job, progress: ProgressReporter) -> anyhow::Result<Value> {
        (self.f)(job.clone(), progress).await
    }
}

/// Wrap an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Job, ProgressReporter) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    FnHandler { f }
}

/// Registry of job handlers keyed by job type.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous handler for `job_type`.
    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let job_type = job_type.into();
        if self.handlers.insert(job_type.clone(), handler).is_some() {
            tracing::debug!(job.type = %job_type, "Replaced job handler");
        }
    }

    /// Remove the handler for `job_type`, returning whether one existed.
    pub fn unregister(&mut self, job_type: &str) -> bool {
        self.handlers.remove(job_type).is_some()
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn has(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// All registered job types, sorted.
    pub fn job_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
