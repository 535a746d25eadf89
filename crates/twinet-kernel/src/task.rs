//! Named tasks and task groups
//!
//! A [`Task`] is a zero-argument unit of work that may be invoked many times
//! (once per retry attempt). Its only side effects should be artifact store
//! reads and writes.

use std::fmt;
use std::sync::Arc;

type TaskBody = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// Named, re-invocable unit of work
#[derive(Clone)]
pub struct Task {
    name: String,
    body: Arc<TaskBody>,
}

impl Task {
    /// Create task from a closure
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Task name as it appears in logs and reports
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one attempt
    ///
    /// # Errors
    /// Whatever the task body returns
    #[inline]
    pub fn invoke(&self) -> anyhow::Result<()> {
        (self.body)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// One step of a plan
///
/// Concurrent members must not depend on each other nor write the same
/// artifact; this is not checked.
#[derive(Debug, Clone)]
pub enum TaskGroup {
    /// Single task run on the driver thread
    Sequential(Task),
    /// Tasks run together on a bounded worker pool, joined before the next group
    Concurrent(Vec<Task>),
}

impl TaskGroup {
    /// Create sequential group
    #[inline]
    #[must_use]
    pub fn sequential(task: Task) -> Self {
        Self::Sequential(task)
    }

    /// Create concurrent group
    #[must_use]
    pub fn concurrent(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self::Concurrent(tasks.into_iter().collect())
    }

    /// Member tasks in declaration order
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        match self {
            Self::Sequential(task) => std::slice::from_ref(task),
            Self::Concurrent(tasks) => tasks,
        }
    }

    /// Number of member tasks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    /// Check if group has no tasks (an empty concurrent group)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    /// Check if group runs on the worker pool
    #[inline]
    #[must_use]
    pub fn is_concurrent(&self) -> bool {
        matches!(self, Self::Concurrent(_))
    }
}

impl From<Task> for TaskGroup {
    fn from(task: Task) -> Self {
        Self::Sequential(task)
    }
}
