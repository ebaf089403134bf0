// tests/runtime_estimator.rs

mod common;
use crate::common::{
    init_tracing, three_invocation_log, timed_invocation, with_timeout, workflow_record,
};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use wfsched::errors::{Result, SchedError};
use wfsched::estimate::{RuntimeEstimate, RuntimeEstimator, spawn_resync_loop};
use wfsched::logs::LogRecord;
use wfsched::stats::{InvocationStat, LogStatisticsStore, StatisticsStore, seed_from_logs};
use wfsched::types::{HostId, TaskTypeId, Timestamp};

/// A store that can be switched to fail every query.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: LogStatisticsStore,
    down: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SchedError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl StatisticsStore for FlakyStore {
    fn host_names(&self) -> Result<BTreeSet<HostId>> {
        self.check()?;
        self.inner.host_names()
    }

    fn task_type_ids(&self, workflow: &str) -> Result<BTreeSet<TaskTypeId>> {
        self.check()?;
        self.inner.task_type_ids(workflow)
    }

    fn statistics_since(
        &self,
        task_type: TaskTypeId,
        host: &str,
        since: Timestamp,
    ) -> Result<Vec<InvocationStat>> {
        self.check()?;
        self.inner.statistics_since(task_type, host, since)
    }

    fn append(&self, record: &LogRecord) -> Result<()> {
        self.check()?;
        self.inner.append(record)
    }
}

fn store_with_align_runs() -> Arc<FlakyStore> {
    let store = Arc::new(FlakyStore::default());
    store.append(&workflow_record("r1", "montage", 0)).unwrap();
    for record in timed_invocation("r1", 1, 5, "hostA", 100, 10) {
        store.append(&record).unwrap();
    }
    for record in timed_invocation("r1", 2, 5, "hostA", 200, 20) {
        store.append(&record).unwrap();
    }
    store
}

#[test]
fn two_statistics_average_to_fifteen() {
    init_tracing();
    let estimator = RuntimeEstimator::new(store_with_align_runs(), "montage");

    let summary = estimator.resync().unwrap();
    assert_eq!(summary.new_hosts, 1);
    assert_eq!(summary.new_task_types, 1);
    assert_eq!(summary.statistics_applied, 2);

    let state = estimator.snapshot();
    let estimate = state.estimate("hostA", 5).unwrap();
    assert_eq!(estimate.weight, 15.0);
    assert_eq!(estimate.finished_tasks, 2);
    assert_eq!(estimate.time_spent_ms, 30);
    assert_eq!(state.watermark("hostA"), Some(200));
}

#[test]
fn resync_without_new_statistics_changes_nothing() {
    init_tracing();
    let estimator = RuntimeEstimator::new(store_with_align_runs(), "montage");
    estimator.resync().unwrap();
    let before = estimator.snapshot();

    let summary = estimator.resync().unwrap();
    assert_eq!(summary.statistics_applied, 0);
    assert_eq!(*estimator.snapshot(), *before);
}

#[test]
fn new_statistics_are_applied_once() {
    init_tracing();
    let store = store_with_align_runs();
    let estimator = RuntimeEstimator::new(store.clone(), "montage");
    estimator.resync().unwrap();

    for record in timed_invocation("r1", 3, 5, "hostA", 300, 30) {
        store.append(&record).unwrap();
    }
    assert_eq!(estimator.resync().unwrap().statistics_applied, 1);
    assert_eq!(estimator.resync().unwrap().statistics_applied, 0);

    let state = estimator.snapshot();
    assert_eq!(state.weight("hostA", 5), Some(20.0));
    assert_eq!(state.estimate("hostA", 5).unwrap().finished_tasks, 3);
    assert_eq!(state.watermark("hostA"), Some(300));
}

#[test]
fn new_hosts_and_task_types_start_at_zero() {
    init_tracing();
    let store = store_with_align_runs();
    let estimator = RuntimeEstimator::new(store.clone(), "montage");
    estimator.resync().unwrap();

    // hostB only ran task type 6; hostA never did.
    for record in timed_invocation("r1", 4, 6, "hostB", 400, 70) {
        store.append(&record).unwrap();
    }
    let summary = estimator.resync().unwrap();
    assert_eq!(summary.new_hosts, 1);
    assert_eq!(summary.new_task_types, 1);

    let state = estimator.snapshot();
    assert_eq!(state.estimate("hostA", 6), Some(&RuntimeEstimate::new(6)));
    assert_eq!(state.weight("hostA", 6), None);
    assert_eq!(state.estimate("hostB", 5), Some(&RuntimeEstimate::new(5)));
    assert_eq!(state.weight("hostB", 6), Some(70.0));
    assert_eq!(state.hosts().collect::<Vec<_>>(), vec!["hostA", "hostB"]);
    assert_eq!(state.task_types().collect::<Vec<_>>(), vec![5, 6]);
}

#[test]
fn store_failure_leaves_previous_state() {
    init_tracing();
    let store = store_with_align_runs();
    let estimator = RuntimeEstimator::new(store.clone(), "montage");
    estimator.resync().unwrap();
    let before = estimator.snapshot();

    store.down.store(true, Ordering::SeqCst);
    match estimator.resync() {
        Err(SchedError::StoreUnavailable(msg)) => assert!(msg.contains("refused")),
        other => panic!("Expected StoreUnavailable, got: {other:?}"),
    }
    assert_eq!(*estimator.snapshot(), *before);

    store.down.store(false, Ordering::SeqCst);
    assert_eq!(estimator.resync().unwrap().statistics_applied, 0);
}

#[test]
fn other_workflows_are_not_tracked() {
    init_tracing();
    let estimator = RuntimeEstimator::new(store_with_align_runs(), "variant-call");
    estimator.resync().unwrap();

    let state = estimator.snapshot();
    assert_eq!(state.task_types().count(), 0);
    assert_eq!(state.iter().count(), 0);
    // The host is known even though nothing is tracked for it.
    assert_eq!(state.hosts().collect::<Vec<_>>(), vec!["hostA"]);
}

#[test]
fn seeded_log_feeds_estimates() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("run.log");
    three_invocation_log().write_to(&log);

    let store = Arc::new(LogStatisticsStore::new());
    seed_from_logs(store.as_ref(), &[log]).unwrap();
    let estimator = RuntimeEstimator::new(store, "montage");
    estimator.resync().unwrap();

    let state = estimator.snapshot();
    assert_eq!(state.weight("h1", 7), Some(500.0));
    assert_eq!(state.weight("h2", 9), Some(200.0));
    assert_eq!(state.weight("h1", 9), None);
    assert_eq!(state.watermark("h1"), Some(1320));
}

#[test]
fn concurrent_resyncs_apply_each_statistic_once() {
    init_tracing();
    let estimator = Arc::new(RuntimeEstimator::new(store_with_align_runs(), "montage"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let estimator = Arc::clone(&estimator);
            std::thread::spawn(move || estimator.resync().unwrap().statistics_applied)
        })
        .collect();
    let applied: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(applied, 2);
    assert_eq!(estimator.snapshot().estimate("hostA", 5).unwrap().finished_tasks, 2);
}

#[tokio::test]
async fn resync_loop_picks_up_new_statistics() {
    init_tracing();
    let store = store_with_align_runs();
    let estimator = Arc::new(RuntimeEstimator::new(store.clone(), "montage"));

    let handle = spawn_resync_loop(Arc::clone(&estimator), Duration::from_millis(20));
    assert!(estimator.snapshot().estimate("hostA", 5).is_none());

    with_timeout(async {
        while estimator.snapshot().weight("hostA", 5).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    for record in timed_invocation("r1", 3, 5, "hostA", 300, 30) {
        store.append(&record).unwrap();
    }
    with_timeout(async {
        while estimator.snapshot().weight("hostA", 5) != Some(20.0) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    handle.abort();

    assert_eq!(estimator.snapshot().estimate("hostA", 5).unwrap().finished_tasks, 3);
}

#[test]
fn time_spent_saturates() {
    let mut estimate = RuntimeEstimate::new(7);
    estimate.observe(u64::MAX);
    estimate.observe(10);

    assert_eq!(estimate.finished_tasks, 2);
    assert_eq!(estimate.time_spent_ms, u64::MAX);
}
