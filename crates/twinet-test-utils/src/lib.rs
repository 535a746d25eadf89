//! Testing utilities for twinet workspace
//!
//! Shared fixtures, instrumented tasks and drivers.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use twinet_artifact::{
    default_drivers, row, ArtifactKind, ArtifactStore, ArtifactValue, AttrGraph, DriverRegistry,
    FormatDriver, FormatError, FormatOptions, Table, WriteSummary,
};
use twinet_kernel::{RetryPolicy, Task};

/// Store rooted in a fresh temporary directory; keep the guard alive
pub fn temp_store() -> (TempDir, Arc<ArtifactStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path()));
    (dir, store)
}

pub fn temp_store_with(drivers: DriverRegistry, cache_capacity: u64) -> (TempDir, Arc<ArtifactStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::with_drivers(dir.path(), drivers, cache_capacity));
    (dir, store)
}

/// Retry policy that does not sleep
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(1))
}

/// `A→B (1), B→C (2), A→C (3)`
pub fn edge_table() -> Table {
    Table::from_rows(
        ["source", "target", "weight"],
        vec![row!["A", "B", 1], row!["B", "C", 2], row!["A", "C", 3]],
    )
    .unwrap()
}

pub fn sample_graph() -> AttrGraph {
    let mut graph = AttrGraph::directed();
    graph.add_weighted_edge("A", "B", 1.0);
    graph.add_weighted_edge("B", "C", 2.0);
    graph.add_weighted_edge("A", "C", 3.0);
    graph.set_node_attr("A", "label", "alpha");
    graph
}

pub fn write_edges_csv(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "source,target,weight\nA,B,1\nB,C,2\nA,C,3\n").unwrap();
}

// ---------------------------------------------------------------------------
// Instrumented tasks
// ---------------------------------------------------------------------------

/// Task that succeeds and counts its invocations
pub fn counting_task(name: &str) -> (Task, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let task = Task::new(name, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (task, calls)
}

/// Task that fails its first `failures` attempts
pub fn flaky_task(name: &str, failures: usize) -> (Task, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let task_name = name.to_owned();
    let task = Task::new(name, move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= failures {
            anyhow::bail!("{task_name}: transient failure {attempt}");
        }
        Ok(())
    });
    (task, calls)
}

pub fn failing_task(name: &str) -> (Task, Arc<AtomicUsize>) {
    flaky_task(name, usize::MAX)
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Ordered record of task start/end events
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Arc<Mutex<Vec<String>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Index of an event; panics if it never happened
    pub fn position(&self, event: &str) -> usize {
        self.events
            .lock()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("event '{event}' not recorded"))
    }

    /// Task recording `<name>:start` and `<name>:end` around a short sleep
    pub fn task(&self, name: &str, work: Duration) -> Task {
        let timeline = self.clone();
        let task_name = name.to_owned();
        Task::new(name, move || {
            timeline.record(format!("{task_name}:start"));
            std::thread::sleep(work);
            timeline.record(format!("{task_name}:end"));
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Concurrency probe
// ---------------------------------------------------------------------------

/// Tracks how many probe tasks run at the same time
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn task(&self, name: &str, work: Duration) -> Task {
        let probe = self.clone();
        Task::new(name, move || {
            let now = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            probe.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(work);
            probe.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Counting driver
// ---------------------------------------------------------------------------

/// Shared read/write counters for [`CountingDriver`]
#[derive(Debug, Clone, Default)]
pub struct DriverCounters {
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl DriverCounters {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }
}

/// Driver wrapper that counts calls to the inner driver
pub struct CountingDriver {
    inner: Arc<dyn FormatDriver>,
    counters: DriverCounters,
}

impl CountingDriver {
    pub fn new(inner: Arc<dyn FormatDriver>, counters: DriverCounters) -> Self {
        Self { inner, counters }
    }
}

impl FormatDriver for CountingDriver {
    fn kind(&self) -> ArtifactKind {
        self.inner.kind()
    }

    fn read(&self, path: &Path, options: &FormatOptions) -> Result<ArtifactValue, FormatError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(path, options)
    }

    fn write(
        &self,
        value: &ArtifactValue,
        path: &Path,
        options: &FormatOptions,
    ) -> Result<WriteSummary, FormatError> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(value, path, options)
    }

    fn canonicalize(&self, value: ArtifactValue, write_options: &FormatOptions) -> ArtifactValue {
        self.inner.canonicalize(value, write_options)
    }
}

/// Built-in drivers, each wrapped in a [`CountingDriver`] sharing one set of counters
pub fn counting_drivers() -> (DriverRegistry, DriverCounters) {
    let defaults = default_drivers();
    let counters = DriverCounters::default();
    let mut registry = DriverRegistry::new();
    for tag in defaults.tags() {
        let inner = defaults.lookup(tag).unwrap();
        registry.register(tag, CountingDriver::new(inner, counters.clone()));
    }
    (registry, counters)
}
