//! Bounded retry with linear backoff
//!
//! A task is attempted up to `max_retries` times in total. After the n-th
//! failed attempt the worker sleeps `n × backoff_unit` before trying again.
//! Store configuration faults (unknown format, undeclared artifact) are never
//! retried. A panicking task counts as a failed attempt.

use crate::task::Task;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use twinet_artifact::StoreError;

/// Default backoff unit
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Attempt budget and backoff for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_unit: Duration,
}

impl RetryPolicy {
    /// Create policy; `max_retries` of zero is treated as one attempt
    #[must_use]
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff_unit,
        }
    }

    /// Single attempt, no retries
    #[inline]
    #[must_use]
    pub fn once() -> Self {
        Self::default()
    }

    /// With total attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// With backoff unit
    #[inline]
    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Total attempt budget (at least one)
    #[inline]
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff unit
    #[inline]
    #[must_use]
    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }

    /// Sleep after the given number of failed attempts
    #[inline]
    #[must_use]
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        self.backoff_unit.saturating_mul(failed_attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

/// What happened to one task under a retry policy
#[derive(Debug)]
pub struct RetryOutcome {
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Wall time including backoff sleeps
    pub elapsed: Duration,
    /// Final result
    pub result: anyhow::Result<()>,
}

impl RetryOutcome {
    /// Check if the task eventually succeeded
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Check if an error must abort without another attempt
///
/// Walks the error chain looking for a non-retryable [`StoreError`].
#[must_use]
pub fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<StoreError>())
        .any(|e| !e.is_retryable())
}

/// Invoke a task once, turning a panic into an error
fn attempt_once(task: &Task) -> anyhow::Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| task.invoke()))
        .unwrap_or_else(|payload| Err(anyhow::anyhow!("task panicked: {}", panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Run a task under `policy`, blocking the current thread during backoff
pub fn run_with_retry(task: &Task, policy: &RetryPolicy, pipeline: &str) -> RetryOutcome {
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        let error = match attempt_once(task) {
            Ok(()) => {
                tracing::debug!(pipeline, task = task.name(), attempt = attempt + 1, "task succeeded");
                return RetryOutcome {
                    attempts: attempt + 1,
                    elapsed: started.elapsed(),
                    result: Ok(()),
                };
            }
            Err(e) => e,
        };

        attempt += 1;
        tracing::warn!(
            pipeline,
            task = task.name(),
            attempt,
            max_retries = policy.max_retries,
            error = %format!("{error:#}"),
            "task attempt failed"
        );

        let fatal = is_fatal(&error);
        if fatal || attempt >= policy.max_retries {
            tracing::error!(
                pipeline,
                task = task.name(),
                attempts = attempt,
                fatal,
                "task failed, giving up"
            );
            return RetryOutcome {
                attempts: attempt,
                elapsed: started.elapsed(),
                result: Err(error),
            };
        }

        std::thread::sleep(policy.backoff(attempt));
    }
}
