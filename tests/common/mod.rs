#![allow(dead_code)]

pub use wfsched_test_utils::builders;
pub use wfsched_test_utils::fake_cluster;
pub use wfsched_test_utils::{event_channel, init_tracing, with_timeout};

use serde_json::json;
use wfsched::logs::{self, Linkage, LogRecord, Reconstruction, RecordKey};

use self::builders::{InvocationSpec, LogBuilder};

/// Two `align` invocations on `h1` and one `sort` on `h2`, in one run.
pub fn three_invocation_log() -> LogBuilder {
    LogBuilder::new("run-1")
        .workflow("montage", 0)
        .invocation(
            InvocationSpec::new(1, 7, "align", "h1", "c1", 100, 400)
                .sched(5)
                .input(1000),
        )
        .invocation(InvocationSpec::new(2, 9, "sort", "h2", "c2", 150, 200).input(50))
        .invocation(
            InvocationSpec::new(3, 7, "align", "h1", "c3", 700, 600)
                .input(1000)
                .input(500),
        )
        .workflow_time(2000, 2000)
}

pub fn reconstruct(builder: &LogBuilder) -> Reconstruction {
    logs::reconstruct(builder.records()).expect("reconstruction should succeed")
}

pub fn workflow_record(run_id: &str, name: &str, ts: u64) -> LogRecord {
    let mut record = LogRecord::new(ts, RecordKey::WorkflowName, json!(name));
    record.run_id = Some(run_id.to_string());
    record
}

/// The `invoc-host` and `invoc-time` records of one finished invocation.
pub fn timed_invocation(
    run_id: &str,
    invocation: u64,
    task_type: u64,
    host: &str,
    ts: u64,
    real_time: u64,
) -> [LogRecord; 2] {
    let linkage = Linkage {
        invocation_id: Some(invocation),
        task_type_id: Some(task_type),
        task_name: Some(format!("type-{task_type}")),
        lang: None,
    };

    let mut host_record = LogRecord::new(ts, RecordKey::InvocHost, json!(host)).with_linkage(&linkage);
    host_record.run_id = Some(run_id.to_string());

    let mut time_record =
        LogRecord::new(ts, RecordKey::InvocTime, json!({"realTime": real_time})).with_linkage(&linkage);
    time_record.run_id = Some(run_id.to_string());

    [host_record, time_record]
}
