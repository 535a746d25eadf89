//! Error types for the task scheduler
//!
//! Provides error handling for:
//! - Pipeline aborts after exhausted retries
//! - Worker pool construction
//! - Configuration loading and validation

use std::path::PathBuf;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A task exhausted its retries (or failed fatally); later groups never ran
    #[error("pipeline '{pipeline}' aborted: task '{task}' failed after {attempts} attempt(s): {error:#}")]
    PipelineAborted {
        pipeline: String,
        task: String,
        attempts: u32,
        error: anyhow::Error,
    },

    /// Thread pool for a concurrent group could not be built
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// `run` was called while another run of the same scheduler is in progress
    #[error("scheduler is already running pipeline '{0}'")]
    AlreadyRunning(String),
}

impl SchedulerError {
    /// Task error that caused an abort
    #[must_use]
    pub fn task_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::PipelineAborted { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Name of the task that caused an abort
    #[must_use]
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            Self::PipelineAborted { task, .. } => Some(task),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema error
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are unusable
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Logging subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
