//! Runtime configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty file
//! is a valid configuration.
//!
//! ```toml
//! datasets = ["dataset-a"]
//!
//! [store]
//! root = "output"
//! cache_capacity = 64
//!
//! [scheduler]
//! max_retries = 1
//! backoff_unit_ms = 1000
//! max_workers = 4
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [pipeline]
//! input_dir = "data"
//! ```

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::scheduler::DEFAULT_MAX_WORKERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use twinet_artifact::{ArtifactStore, DEFAULT_CACHE_CAPACITY};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwinetConfig {
    /// Dataset identifiers, one pipeline run each
    pub datasets: Vec<String>,
    /// Artifact store settings
    pub store: StoreConfig,
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Pipeline-specific settings, interpreted by the pipeline itself
    pub pipeline: toml::Table,
}

impl TwinetConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid TOML for this schema
    /// - `ConfigError::Invalid` if values are out of range
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` if it is not valid TOML for this schema
    /// - `ConfigError::Invalid` if values are out of range
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.cache_capacity == 0 {
            return Err(ConfigError::Invalid("store.cache_capacity must be at least 1".into()));
        }
        if self.scheduler.max_workers == 0 {
            return Err(ConfigError::Invalid("scheduler.max_workers must be at least 1".into()));
        }
        if let Some(empty) = self.datasets.iter().position(String::is_empty) {
            return Err(ConfigError::Invalid(format!("datasets[{empty}] is empty")));
        }
        Ok(())
    }

    /// With dataset identifiers
    #[inline]
    #[must_use]
    pub fn with_datasets<I, S>(mut self, datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datasets = datasets.into_iter().map(Into::into).collect();
        self
    }

    /// With store root
    #[inline]
    #[must_use]
    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store.root = root.into();
        self
    }

    /// With scheduler settings
    #[inline]
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// With one pipeline setting
    #[inline]
    #[must_use]
    pub fn with_pipeline_value(mut self, name: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.pipeline.insert(name.into(), value.into());
        self
    }

    /// String pipeline setting
    #[must_use]
    pub fn pipeline_str(&self, name: &str) -> Option<&str> {
        self.pipeline.get(name).and_then(toml::Value::as_str)
    }
}

/// Artifact store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory of default artifact locations
    pub root: PathBuf,
    /// Maximum number of cached artifact values
    pub cache_capacity: u64,
}

impl StoreConfig {
    /// Build an empty store with the built-in drivers
    #[must_use]
    pub fn build_store(&self) -> ArtifactStore {
        ArtifactStore::with_capacity(&self.root, self.cache_capacity)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Total attempts per task (zero behaves like one)
    pub max_retries: u32,
    /// Linear backoff unit in milliseconds
    pub backoff_unit_ms: u64,
    /// Bound on concurrently running tasks
    pub max_workers: usize,
}

impl SchedulerConfig {
    /// Retry policy described by these settings
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_unit_ms))
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With backoff unit
    #[inline]
    #[must_use]
    pub fn with_backoff_unit_ms(mut self, ms: u64) -> Self {
        self.backoff_unit_ms = ms;
        self
    }

    /// With worker bound
    #[inline]
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_unit_ms: 1000,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}
