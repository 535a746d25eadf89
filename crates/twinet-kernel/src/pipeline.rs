//! Pipeline Definition
//!
//! A named, ordered plan of task groups together with the artifacts its
//! tasks produce. Building a pipeline declares those artifacts in the store,
//! so every key a task touches resolves before the first task runs.
//!
//! ```rust,ignore
//! let edges = ArtifactSpec::new("network", "creation", "edges", "csv").with_prefix("ds1");
//! let pipeline = Pipeline::builder("network")
//!     .artifact(edges)
//!     .sequential(ingest)
//!     .concurrent([build_graph, degree_table])
//!     .sequential(summarize)
//!     .build(&store)?;
//! let report = pipeline.run(&scheduler)?;
//! ```

use crate::error::SchedulerResult;
use crate::retry::RetryPolicy;
use crate::scheduler::{RunReport, TaskScheduler};
use crate::task::{Task, TaskGroup};
use twinet_artifact::{ArtifactKey, ArtifactSpec, ArtifactStore, StoreResult};

/// Builder for [`Pipeline`]
#[derive(Debug)]
pub struct PipelineBuilder {
    name: String,
    specs: Vec<ArtifactSpec>,
    plan: Vec<TaskGroup>,
}

impl PipelineBuilder {
    /// Declare one artifact
    #[must_use]
    pub fn artifact(mut self, spec: ArtifactSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Declare several artifacts
    #[must_use]
    pub fn artifacts(mut self, specs: impl IntoIterator<Item = ArtifactSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Append a sequential group
    #[must_use]
    pub fn sequential(self, task: Task) -> Self {
        self.group(TaskGroup::Sequential(task))
    }

    /// Append a concurrent group
    #[must_use]
    pub fn concurrent(self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.group(TaskGroup::concurrent(tasks))
    }

    /// Append any group
    #[must_use]
    pub fn group(mut self, group: TaskGroup) -> Self {
        self.plan.push(group);
        self
    }

    /// Declare the artifacts in `store` and finish the pipeline
    ///
    /// # Errors
    /// Returns `StoreError::UnknownFormat` if an artifact names an unregistered
    /// format; nothing is declared in that case
    pub fn build(self, store: &ArtifactStore) -> StoreResult<Pipeline> {
        let artifacts = store.declare(self.specs)?;
        tracing::debug!(
            pipeline = %self.name,
            artifacts = artifacts.len(),
            groups = self.plan.len(),
            "pipeline built"
        );
        Ok(Pipeline {
            name: self.name,
            artifacts,
            plan: self.plan,
        })
    }
}

/// Named plan bound to declared artifacts
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    artifacts: Vec<ArtifactKey>,
    plan: Vec<TaskGroup>,
}

impl Pipeline {
    /// Start building a pipeline
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            specs: Vec::new(),
            plan: Vec::new(),
        }
    }

    /// Pipeline name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys declared at build time, in declaration order
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactKey] {
        &self.artifacts
    }

    /// Ordered task groups
    #[inline]
    #[must_use]
    pub fn plan(&self) -> &[TaskGroup] {
        &self.plan
    }

    /// Check if every declared artifact already exists
    ///
    /// # Errors
    /// Store errors from the existence checks
    pub fn is_materialized(&self, store: &ArtifactStore) -> StoreResult<bool> {
        store.exists_all(&self.artifacts)
    }

    /// Hand the plan to `scheduler` with its own retry policy
    ///
    /// # Errors
    /// See [`TaskScheduler::run`]
    pub fn run(&self, scheduler: &TaskScheduler) -> SchedulerResult<RunReport> {
        scheduler.run(&self.name, &self.plan)
    }

    /// Hand the plan to `scheduler` with an explicit retry policy
    ///
    /// # Errors
    /// See [`TaskScheduler::run_with`]
    pub fn run_with(&self, scheduler: &TaskScheduler, retry: RetryPolicy) -> SchedulerResult<RunReport> {
        scheduler.run_with(&self.name, &self.plan, retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RunState;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn build_declares_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let pipeline = Pipeline::builder("network")
            .artifact(ArtifactSpec::new("network", "creation", "edges", "csv"))
            .artifacts([ArtifactSpec::new("network", "creation", "summary", "json")])
            .build(&store)
            .unwrap();

        assert_eq!(pipeline.name(), "network");
        assert_eq!(pipeline.artifacts().len(), 2);
        assert_eq!(store.declared_keys().len(), 2);
        assert!(!pipeline.is_materialized(&store).unwrap());
    }

    #[test]
    fn unknown_format_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let result = Pipeline::builder("p")
            .artifact(ArtifactSpec::new("p", "s", "x", "feather"))
            .build(&store);
        assert!(result.is_err());
        assert!(store.declared_keys().is_empty());
    }

    #[test]
    fn run_writes_declared_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path()));
        let spec = ArtifactSpec::new("p", "s", "summary", "json");
        let key = spec.key();

        let writer = {
            let store = Arc::clone(&store);
            let key = key.clone();
            Task::new("write_summary", move || {
                store.write(&key, json!({"ok": true}))?;
                Ok(())
            })
        };

        let pipeline = Pipeline::builder("p")
            .artifact(spec)
            .sequential(writer)
            .build(&store)
            .unwrap();
        assert_eq!(pipeline.plan().len(), 1);

        let report = pipeline.run(&TaskScheduler::default()).unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert!(pipeline.is_materialized(&store).unwrap());
        assert_eq!(store.read_document(&key).unwrap(), json!({"ok": true}));
    }
}
