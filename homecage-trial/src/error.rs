use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure of the experimental log. Always fatal to the run.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create log file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write csv row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to encode json row: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log sink i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Reward pulse or audio cue failure. Recoverable once the run has started.
#[derive(Debug, Error)]
pub enum PeripheralError {
    #[error("failed to open {device}: {reason}")]
    Open { device: String, reason: String },
    #[error("write to {device} failed: {source}")]
    Write {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("audio cue failed: {0}")]
    Audio(String),
}

#[derive(Debug, Error)]
pub enum TrialError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("experimental log failed: {0}")]
    Log(#[from] LogError),
}
