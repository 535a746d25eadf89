//! Task Scheduler
//!
//! Drives an ordered plan of task groups on the calling thread. Sequential
//! groups run in place; concurrent groups run on a rayon pool sized
//! `min(group size, max_workers)` and are joined before the next group starts.
//! Every task runs under the retry policy; the first task that gives up aborts
//! the run once its group has finished.
//!
//! # State machine
//!
//! ```text
//! Idle → Running → Completed
//!              └→ Aborted
//! ```
//!
//! There is no cancellation and no timeout: a task that never returns hangs
//! the run.

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::retry::{run_with_retry, RetryOutcome, RetryPolicy};
use crate::task::{Task, TaskGroup};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default bound on concurrently running tasks
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Lifecycle of a scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    /// Check if state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        })
    }
}

/// Outcome of one task within a run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Task name
    pub name: String,
    /// Attempts made
    pub attempts: u32,
    /// Wall time including backoff
    pub elapsed_ms: u64,
    /// Whether the task eventually succeeded
    pub succeeded: bool,
    /// Rendered final error, if any
    pub error: Option<String>,
}

impl TaskReport {
    fn from_outcome(name: &str, outcome: &RetryOutcome) -> Self {
        Self {
            name: name.to_owned(),
            attempts: outcome.attempts,
            elapsed_ms: millis(outcome.elapsed),
            succeeded: outcome.succeeded(),
            error: outcome.result.as_ref().err().map(|e| format!("{e:#}")),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Pipeline name
    pub pipeline: String,
    /// Terminal state
    pub state: RunState,
    /// Every task that ran, in completion order per group
    pub tasks: Vec<TaskReport>,
    /// Total wall time
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Report for a task by name
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Total attempts across all tasks
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.tasks.iter().map(|t| t.attempts).sum()
    }
}

/// Executes plans of task groups with bounded retries
#[derive(Debug)]
pub struct TaskScheduler {
    retry: RetryPolicy,
    max_workers: usize,
    state: Mutex<RunState>,
    last_report: Mutex<Option<RunReport>>,
}

impl TaskScheduler {
    /// Create scheduler with a default retry policy
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            max_workers: DEFAULT_MAX_WORKERS,
            state: Mutex::new(RunState::Idle),
            last_report: Mutex::new(None),
        }
    }

    /// Create scheduler from configuration
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.retry_policy()).with_max_workers(config.max_workers)
    }

    /// With bound on concurrently running tasks (at least one)
    #[inline]
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Worker bound for concurrent groups
    #[inline]
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Default retry policy
    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Current run state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Report of the most recent finished run, aborted or not
    #[must_use]
    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report.lock().clone()
    }

    /// Run a plan with the scheduler's retry policy
    ///
    /// # Errors
    /// See [`TaskScheduler::run_with`]
    pub fn run(&self, pipeline: &str, plan: &[TaskGroup]) -> SchedulerResult<RunReport> {
        self.run_with(pipeline, plan, self.retry)
    }

    /// Run a plan with an explicit retry policy
    ///
    /// # Errors
    /// - `SchedulerError::AlreadyRunning` if this scheduler is mid-run
    /// - `SchedulerError::WorkerPool` if a worker pool cannot be built
    /// - `SchedulerError::PipelineAborted` when a task gives up; later groups do not run
    pub fn run_with(
        &self,
        pipeline: &str,
        plan: &[TaskGroup],
        retry: RetryPolicy,
    ) -> SchedulerResult<RunReport> {
        {
            let mut state = self.state.lock();
            if *state == RunState::Running {
                return Err(SchedulerError::AlreadyRunning(pipeline.to_owned()));
            }
            *state = RunState::Running;
        }
        let _guard = RunGuard { state: &self.state };

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(%run_id, pipeline, groups = plan.len(), "pipeline run started");

        let mut tasks = Vec::new();

        for (index, group) in plan.iter().enumerate() {
            tracing::info!(
                pipeline,
                group = index,
                size = group.len(),
                concurrent = group.is_concurrent(),
                "group started"
            );

            let outcomes = match group {
                TaskGroup::Sequential(task) => {
                    vec![(task, run_with_retry(task, &retry, pipeline))]
                }
                TaskGroup::Concurrent(members) => {
                    match self.run_concurrent(pipeline, members, &retry) {
                        Ok(outcomes) => outcomes,
                        Err(e) => {
                            self.finish(run_id, pipeline, RunState::Aborted, tasks, started);
                            return Err(e);
                        }
                    }
                }
            };

            let mut failure = None;
            for (task, outcome) in outcomes {
                tasks.push(TaskReport::from_outcome(task.name(), &outcome));
                if let Err(error) = outcome.result {
                    failure.get_or_insert((task.name().to_owned(), outcome.attempts, error));
                }
            }

            if let Some((task, attempts, error)) = failure {
                tracing::error!(pipeline, group = index, task = %task, "pipeline aborted");
                self.finish(run_id, pipeline, RunState::Aborted, tasks, started);
                return Err(SchedulerError::PipelineAborted {
                    pipeline: pipeline.to_owned(),
                    task,
                    attempts,
                    error,
                });
            }
            tracing::info!(pipeline, group = index, "group finished");
        }

        Ok(self.finish(run_id, pipeline, RunState::Completed, tasks, started))
    }

    fn run_concurrent<'t>(
        &self,
        pipeline: &str,
        members: &'t [Task],
        retry: &RetryPolicy,
    ) -> SchedulerResult<Vec<(&'t Task, RetryOutcome)>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let workers = members.len().min(self.max_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("twinet-worker-{i}"))
            .build()?;

        tracing::debug!(pipeline, workers, tasks = members.len(), "worker pool ready");
        Ok(pool.install(|| {
            members
                .par_iter()
                .map(|task| (task, run_with_retry(task, retry, pipeline)))
                .collect()
        }))
    }

    fn finish(
        &self,
        run_id: Uuid,
        pipeline: &str,
        state: RunState,
        tasks: Vec<TaskReport>,
        started: Instant,
    ) -> RunReport {
        let report = RunReport {
            run_id,
            pipeline: pipeline.to_owned(),
            state,
            tasks,
            elapsed_ms: millis(started.elapsed()),
        };
        tracing::info!(
            %run_id,
            pipeline,
            state = %state,
            elapsed_ms = report.elapsed_ms,
            "pipeline run finished"
        );
        *self.last_report.lock() = Some(report.clone());
        *self.state.lock() = state;
        report
    }
}

/// Leaves the scheduler `Aborted` if a run unwinds before reaching `finish`
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            *state = RunState::Aborted;
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ok(name: &str) -> Task {
        Task::new(name, || Ok(()))
    }

    fn failing(name: &str) -> Task {
        Task::new(name, || anyhow::bail!("always fails"))
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn starts_idle() {
        assert_eq!(TaskScheduler::default().state(), RunState::Idle);
        assert!(TaskScheduler::default().last_report().is_none());
    }

    #[test]
    fn empty_plan_completes() {
        let scheduler = TaskScheduler::default();
        let report = scheduler.run("p", &[]).unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(scheduler.state(), RunState::Completed);
    }

    #[test]
    fn successful_plan_reports_every_task() {
        let scheduler = TaskScheduler::default();
        let plan = [
            TaskGroup::sequential(ok("a")),
            TaskGroup::concurrent([ok("b"), ok("c")]),
            TaskGroup::concurrent(Vec::new()),
            TaskGroup::sequential(ok("d")),
        ];
        let report = scheduler.run("p", &plan).unwrap();
        assert_eq!(report.tasks.len(), 4);
        assert_eq!(report.total_attempts(), 4);
        assert!(report.task("c").unwrap().succeeded);
    }

    #[test]
    fn failure_aborts_and_records_report() {
        let scheduler = TaskScheduler::new(fast(2));
        let plan = [
            TaskGroup::sequential(failing("a")),
            TaskGroup::sequential(ok("b")),
        ];
        let err = scheduler.run("p", &plan).unwrap_err();
        assert!(matches!(
            &err,
            SchedulerError::PipelineAborted { task, attempts: 2, .. } if task == "a"
        ));
        assert_eq!(scheduler.state(), RunState::Aborted);

        let report = scheduler.last_report().unwrap();
        assert_eq!(report.state, RunState::Aborted);
        assert!(report.task("b").is_none());
        assert_eq!(report.task("a").unwrap().error.as_deref(), Some("always fails"));
    }

    #[test]
    fn concurrent_failure_lets_siblings_finish() {
        let finished = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&finished);
        let slow = Task::new("slow", move || {
            std::thread::sleep(Duration::from_millis(30));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let scheduler = TaskScheduler::new(fast(1));
        let plan = [TaskGroup::concurrent([failing("bad"), slow])];
        assert!(scheduler.run("p", &plan).is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(scheduler.last_report().unwrap().task("slow").unwrap().succeeded);
    }

    #[test]
    fn nested_run_is_rejected() {
        let scheduler = Arc::new(TaskScheduler::default());
        let inner = Arc::clone(&scheduler);
        let plan = [TaskGroup::sequential(Task::new("reenter", move || {
            match inner.run("inner", &[]) {
                Err(SchedulerError::AlreadyRunning(_)) => Ok(()),
                other => anyhow::bail!("expected AlreadyRunning, got {other:?}"),
            }
        }))];
        scheduler.run("outer", &plan).unwrap();
    }

    #[test]
    fn scheduler_is_reusable_after_abort() {
        let scheduler = TaskScheduler::default();
        assert!(scheduler.run("p", &[TaskGroup::sequential(failing("a"))]).is_err());
        assert!(scheduler.run("p", &[TaskGroup::sequential(ok("a"))]).is_ok());
        assert_eq!(scheduler.state(), RunState::Completed);
    }

    fn out_of_bounds(name: &str) -> Task {
        Task::new(name, || {
            let rows: Vec<u32> = Vec::new();
            let _ = rows[1];
            Ok(())
        })
    }

    #[test]
    fn panicking_task_aborts_and_frees_scheduler() {
        let scheduler = TaskScheduler::new(fast(3));
        let plan = [
            TaskGroup::sequential(out_of_bounds("a")),
            TaskGroup::sequential(ok("b")),
        ];
        let err = scheduler.run("p", &plan).unwrap_err();
        assert!(matches!(
            &err,
            SchedulerError::PipelineAborted { task, attempts: 3, .. } if task == "a"
        ));
        assert_eq!(scheduler.state(), RunState::Aborted);
        let report = scheduler.last_report().unwrap();
        assert!(report.task("a").unwrap().error.as_deref().unwrap().starts_with("task panicked"));

        assert!(scheduler.run("p", &[TaskGroup::sequential(ok("b"))]).is_ok());
        assert_eq!(scheduler.state(), RunState::Completed);
    }

    #[test]
    fn panicking_concurrent_member_lets_siblings_finish() {
        let scheduler = TaskScheduler::new(fast(2));
        let plan = [TaskGroup::concurrent([out_of_bounds("bad"), ok("good")])];
        assert!(scheduler.run("p", &plan).is_err());
        let report = scheduler.last_report().unwrap();
        assert_eq!(report.task("bad").unwrap().attempts, 2);
        assert!(report.task("good").unwrap().succeeded);
        assert_eq!(scheduler.state(), RunState::Aborted);
    }

    #[test]
    fn unwinding_run_does_not_stay_running() {
        let scheduler = TaskScheduler::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            *scheduler.state.lock() = RunState::Running;
            let _guard = RunGuard { state: &scheduler.state };
            panic!("unwinding mid-run");
        }));
        assert!(outcome.is_err());
        assert_eq!(scheduler.state(), RunState::Aborted);
        assert!(scheduler.run("p", &[]).is_ok());
    }

    #[test]
    fn worker_bound_is_at_least_one() {
        assert_eq!(TaskScheduler::default().with_max_workers(0).max_workers(), 1);
    }

    #[test]
    fn report_serializes() {
        let report = TaskScheduler::default().run("p", &[TaskGroup::sequential(ok("a"))]).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["tasks"][0]["name"], "a");
    }
}
