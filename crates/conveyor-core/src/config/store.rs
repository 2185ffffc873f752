use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the job/schedule store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file. `:memory:` opens a private
    /// in-memory database.
    pub path: PathBuf,

    /// Enable WAL mode
    /// Default: true
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// SQLite synchronous mode
    #[serde(default)]
    pub synchronous: SynchronousMode,

    /// How long a writer waits on a locked database before giving up
    /// Default: 5000
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retry backoff applied by `fail`
    #[serde(default)]
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SynchronousMode {
    /// Full fsync (safest, slowest)
    Full,
    /// fsync at critical moments (good balance)
    #[default]
    Normal,
    /// No fsync (fastest, least safe)
    Off,
}

impl SynchronousMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
            Self::Off => "OFF",
        }
    }
}

/// Exponential retry backoff: `base_ms * 2^(attempt-1)`, capped at `max_ms`,
/// plus up to `jitter` of the delay at random. The jittered delay never
/// exceeds `max_ms`, and delays above one year are clamped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,

    /// Fraction in `[0, 1]`
    #[serde(default = "default_backoff_jitter")]
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            max_ms: default_backoff_max_ms(),
            jitter: default_backoff_jitter(),
        }
    }
}

impl BackoffConfig {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter: default_backoff_jitter(),
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_backoff_max_ms() -> u64 {
    300_000
}

fn default_backoff_jitter() -> f64 {
    0.1
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: default_wal_mode(),
            synchronous: SynchronousMode::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
            backoff: BackoffConfig::default(),
        }
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(":memory:").with_wal_mode(false)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }

    pub fn with_synchronous(mut self, synchronous: SynchronousMode) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }

    pub fn with_busy_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}
