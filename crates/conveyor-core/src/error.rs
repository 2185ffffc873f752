use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConveyorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cron parsing error: {0}")]
    CronParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Already running")]
    AlreadyRunning,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ConveyorError>;

// Driver errors map into `Database` at the call site; the orphan rule keeps
// a `From<rusqlite::Error>` impl out of this crate.
