//! Per-source aggregation for handlers that fan out over several inputs.

use serde::Serialize;
use serde_json::Value;

/// Tally of a multi-source job such as a news fetch.
///
/// One failing source does not fail the job. [`into_result`](Self::into_result)
/// only errors when every recorded source failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub articles_added: usize,
    pub articles_skipped: usize,
    /// `"<source>: <error>"` for each failed source.
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, source: &str, added: usize, skipped: usize) {
        tracing::debug!(source, added, skipped, "Source processed");
        self.sources_succeeded += 1;
        self.articles_added += added;
        self.articles_skipped += skipped;
    }

    pub fn record_failure(&mut self, source: &str, error: impl std::fmt::Display) {
        tracing::warn!(source, error = %error, "Source failed");
        self.sources_failed += 1;
        self.errors.push(format!("{source}: {error}"));
    }

    pub fn sources_total(&self) -> usize {
        self.sources_succeeded + self.sources_failed
    }

    /// JSON job result, or an error when no source succeeded.
    ///
    /// An empty batch counts as success.
    pub fn into_result(self) -> anyhow::Result<Value> {
        if self.sources_failed > 0 && self.sources_succeeded == 0 {
            anyhow::bail!(
                "all {} sources failed: {}",
                self.sources_failed,
                self.errors.join("; ")
            );
        }
        Ok(serde_json::to_value(self)?)
    }
}
