use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use twinet_artifact::{ArtifactKey, ArtifactSpec};
use twinet_kernel::{RunState, SchedulerError, Task, TaskGroup, TaskScheduler};
use twinet_test_utils::{
    counting_task, failing_task, fast_retry, flaky_task, temp_store, ConcurrencyProbe, Timeline,
};

#[test]
fn retried_task_persists_value_from_successful_attempt() {
    let (_dir, store) = temp_store();
    let key = store
        .declare_one(ArtifactSpec::new("p", "s", "result", "json"))
        .unwrap();

    let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let task = {
        let store = Arc::clone(&store);
        let key = key.clone();
        let attempts = Arc::clone(&attempts);
        Task::new("compute", move || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                anyhow::bail!("not yet");
            }
            store.write(&key, serde_json::json!({ "attempt": n }))?;
            Ok(())
        })
    };

    let scheduler = TaskScheduler::new(fast_retry(3));
    let report = scheduler.run("p", &[TaskGroup::sequential(task)]).unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.task("compute").unwrap().attempts, 3);
    assert_eq!(
        store.read_document(&key).unwrap(),
        serde_json::json!({ "attempt": 3 })
    );
}

#[test]
fn exhausted_retries_abort_before_later_groups() {
    let (broken, broken_calls) = failing_task("broken");
    let (later, later_calls) = counting_task("later");

    let scheduler = TaskScheduler::new(fast_retry(3));
    let err = scheduler
        .run(
            "p",
            &[TaskGroup::sequential(broken), TaskGroup::sequential(later)],
        )
        .unwrap_err();

    match err {
        SchedulerError::PipelineAborted { task, attempts, .. } => {
            assert_eq!(task, "broken");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(broken_calls.load(Ordering::SeqCst), 3);
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.state(), RunState::Aborted);

    let report = scheduler.last_report().unwrap();
    assert_eq!(report.state, RunState::Aborted);
    assert!(report.task("later").is_none());
}

#[test]
fn flaky_member_of_concurrent_group_recovers() {
    let (steady, steady_calls) = counting_task("steady");
    let (flaky, flaky_calls) = flaky_task("flaky", 1);

    let scheduler = TaskScheduler::new(fast_retry(2));
    let report = scheduler
        .run("p", &[TaskGroup::concurrent([steady, flaky])])
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(steady_calls.load(Ordering::SeqCst), 1);
    assert_eq!(flaky_calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.total_attempts(), 3);
}

#[test]
fn groups_run_in_order_and_concurrent_members_join() {
    let timeline = Timeline::new();
    let work = Duration::from_millis(20);
    let plan = [
        TaskGroup::sequential(timeline.task("A", work)),
        TaskGroup::concurrent([timeline.task("B", work), timeline.task("C", work)]),
        TaskGroup::sequential(timeline.task("D", work)),
    ];

    TaskScheduler::new(fast_retry(1))
        .with_max_workers(2)
        .run("p", &plan)
        .unwrap();

    let a_end = timeline.position("A:end");
    for member in ["B", "C"] {
        assert!(a_end < timeline.position(&format!("{member}:start")));
        assert!(timeline.position(&format!("{member}:end")) < timeline.position("D:start"));
    }
    assert_eq!(timeline.events().len(), 8);
}

#[test]
fn worker_pool_never_exceeds_bound() {
    let probe = ConcurrencyProbe::new();
    let members: Vec<Task> = (0..6)
        .map(|i| probe.task(&format!("t{i}"), Duration::from_millis(30)))
        .collect();

    let report = TaskScheduler::new(fast_retry(1))
        .with_max_workers(2)
        .run("p", &[TaskGroup::concurrent(members)])
        .unwrap();

    assert_eq!(report.tasks.len(), 6);
    assert!(probe.peak() >= 1);
    assert!(probe.peak() <= 2, "peak concurrency {}", probe.peak());
}

#[test]
fn configuration_faults_are_not_retried() {
    let (_dir, store) = temp_store();
    let undeclared = ArtifactKey::new("p", "s", "missing.json");
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let task = {
        let store = Arc::clone(&store);
        let calls = Arc::clone(&calls);
        Task::new("reader", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            store.read(&undeclared)?;
            Ok(())
        })
    };

    let err = TaskScheduler::new(fast_retry(5))
        .run("p", &[TaskGroup::sequential(task)])
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.failed_task(), Some("reader"));
}

#[test]
fn missing_input_is_retried() {
    let (_dir, store) = temp_store();
    let key = store
        .declare_one(ArtifactSpec::new("p", "s", "late", "json"))
        .unwrap();
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let task = {
        let store = Arc::clone(&store);
        let calls = Arc::clone(&calls);
        Task::new("reader", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            store.read(&key)?;
            Ok(())
        })
    };

    let result = TaskScheduler::new(fast_retry(3)).run("p", &[TaskGroup::sequential(task)]);
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
