//! twinet Kernel
//!
//! Runs multi-stage pipelines over the artifact store:
//! 1. **Definition**: a [`Pipeline`] declares its artifacts and an ordered plan
//!    of sequential and concurrent task groups
//! 2. **Execution**: the [`TaskScheduler`] drives the plan with a bounded worker
//!    pool, retrying failed tasks with linear backoff
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use twinet_kernel::prelude::*;
//!
//! let config = TwinetConfig::from_file("twinet.toml")?;
//! twinet_kernel::logging::init(&config.logging)?;
//!
//! let store = Arc::new(config.store.build_store());
//! let pipeline = Pipeline::builder("network")
//!     .artifact(edges_spec)
//!     .sequential(ingest)
//!     .concurrent([build_graph, degree_table])
//!     .build(&store)?;
//!
//! let scheduler = TaskScheduler::from_config(&config.scheduler);
//! let report = pipeline.run(&scheduler)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod task;

// Re-exports
pub use config::{LoggingConfig, SchedulerConfig, StoreConfig, TwinetConfig};
pub use error::{ConfigError, SchedulerError, SchedulerResult};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use retry::{is_fatal, run_with_retry, RetryOutcome, RetryPolicy, DEFAULT_BACKOFF_UNIT};
pub use scheduler::{RunReport, RunState, TaskReport, TaskScheduler, DEFAULT_MAX_WORKERS};
pub use task::{Task, TaskGroup};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for pipeline authors
pub mod prelude {
    pub use crate::config::TwinetConfig;
    pub use crate::error::{SchedulerError, SchedulerResult};
    pub use crate::pipeline::Pipeline;
    pub use crate::retry::RetryPolicy;
    pub use crate::scheduler::{RunReport, RunState, TaskScheduler};
    pub use crate::task::{Task, TaskGroup};
    pub use std::sync::Arc;
    pub use twinet_artifact::prelude::*;
}
