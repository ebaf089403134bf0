#![allow(dead_code)]

use std::path::Path;

use serde_json::{Value, json};
use wfsched::logs::{LogRecord, RecordKey};
use wfsched::logs::record::render_records;
use wfsched::sched::{TaskInstance, TaskState};
use wfsched::types::{InvocationId, TaskId, TaskTypeId, Timestamp};

/// Timings of one invocation attempt inside a synthetic log.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub invocation: InvocationId,
    pub task_type: TaskTypeId,
    pub task_name: String,
    pub host: String,
    pub container: String,
    /// `invoc-exec` and `container-requested`.
    pub ready_at: Timestamp,
    pub allocated_at: Timestamp,
    pub sched_ms: Option<u64>,
    /// `(record timestamp, realTime)` of `invoc-time-stagein`.
    pub stage_in: Option<(Timestamp, u64)>,
    /// `(record timestamp, realTime)` of `invoc-time`.
    pub exec: (Timestamp, u64),
    /// `(record timestamp, realTime)` of `invoc-time-stageout`.
    pub stage_out: Option<(Timestamp, u64)>,
    pub completed_at: Timestamp,
    pub exit_code: i64,
    pub input_bytes: Vec<u64>,
}

impl InvocationSpec {
    /// An attempt that becomes ready at `start`, gets its container 10ms
    /// later, starts executing 10ms after that, runs for `exec_ms`, and
    /// releases its container 5ms after finishing.
    pub fn new(
        invocation: InvocationId,
        task_type: TaskTypeId,
        task_name: &str,
        host: &str,
        container: &str,
        start: Timestamp,
        exec_ms: u64,
    ) -> Self {
        let exec_end = start + 20 + exec_ms;
        Self {
            invocation,
            task_type,
            task_name: task_name.to_string(),
            host: host.to_string(),
            container: container.to_string(),
            ready_at: start,
            allocated_at: start + 10,
            sched_ms: None,
            stage_in: None,
            exec: (exec_end, exec_ms),
            stage_out: None,
            completed_at: exec_end + 5,
            exit_code: 0,
            input_bytes: Vec::new(),
        }
    }

    pub fn sched(mut self, ms: u64) -> Self {
        self.sched_ms = Some(ms);
        self
    }

    pub fn stage_in(mut self, end: Timestamp, real_time: u64) -> Self {
        self.stage_in = Some((end, real_time));
        self
    }

    pub fn stage_out(mut self, end: Timestamp, real_time: u64) -> Self {
        self.stage_out = Some((end, real_time));
        self
    }

    pub fn completed_at(mut self, ts: Timestamp) -> Self {
        self.completed_at = ts;
        self
    }

    pub fn input(mut self, bytes: u64) -> Self {
        self.input_bytes.push(bytes);
        self
    }

    /// The container exits with `code`; no timing records are written.
    pub fn failing(mut self, code: i64) -> Self {
        self.exit_code = code;
        self
    }
}

/// Builds a workflow-run log in arrival order.
///
/// Cluster events for an attempt are written as they happen; the timed
/// records follow the container completion, the way the runtime flushes them.
#[derive(Debug, Clone)]
pub struct LogBuilder {
    run_id: String,
    records: Vec<LogRecord>,
}

impl LogBuilder {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            records: Vec::new(),
        }
    }

    fn push(&mut self, ts: Timestamp, key: RecordKey, value: Value, linked: Option<&InvocationSpec>) {
        let mut record = LogRecord::new(ts, key, value);
        record.run_id = Some(self.run_id.clone());
        if let Some(spec) = linked {
            record.linkage.invocation_id = Some(spec.invocation);
            record.linkage.task_type_id = Some(spec.task_type);
            record.linkage.task_name = Some(spec.task_name.clone());
        }
        self.records.push(record);
    }

    /// `wf-name` record marking the run onset.
    pub fn workflow(mut self, name: &str, onset: Timestamp) -> Self {
        self.push(onset, RecordKey::WorkflowName, json!(name), None);
        self
    }

    /// `wf-time` record with the measured total runtime.
    pub fn workflow_time(mut self, ts: Timestamp, runtime_ms: u64) -> Self {
        self.push(ts, RecordKey::WorkflowTime, json!(runtime_ms), None);
        self
    }

    pub fn invocation(mut self, spec: InvocationSpec) -> Self {
        self.push(spec.ready_at, RecordKey::InvocExec, json!({}), Some(&spec));
        self.push(
            spec.ready_at,
            RecordKey::ClusterEvent,
            json!({"type": "container-requested"}),
            None,
        );
        self.push(
            spec.allocated_at,
            RecordKey::ClusterEvent,
            json!({"type": "container-allocated", "container-id": spec.container}),
            None,
        );
        self.push(
            spec.completed_at,
            RecordKey::ClusterEvent,
            json!({
                "type": "container-completed",
                "container-id": spec.container,
                "exit-code": spec.exit_code,
            }),
            None,
        );

        if spec.exit_code != 0 {
            return self;
        }

        self.push(spec.allocated_at, RecordKey::InvocHost, json!(spec.host), Some(&spec));
        if let Some(ms) = spec.sched_ms {
            self.push(
                spec.ready_at,
                RecordKey::InvocTimeSched,
                json!({"realTime": ms}),
                Some(&spec),
            );
        }
        if let Some((end, real_time)) = spec.stage_in {
            self.push(end, RecordKey::InvocTimeStagein, json!({"realTime": real_time}), Some(&spec));
        }
        for &bytes in &spec.input_bytes {
            self.push(spec.allocated_at, RecordKey::FileSizeStagein, json!(bytes), Some(&spec));
        }
        let (exec_end, exec_ms) = spec.exec;
        self.push(exec_end, RecordKey::InvocTime, json!({"realTime": exec_ms}), Some(&spec));
        if let Some((end, real_time)) = spec.stage_out {
            self.push(end, RecordKey::InvocTimeStageout, json!({"realTime": real_time}), Some(&spec));
        }
        self
    }

    /// Append an arbitrary record.
    pub fn raw(mut self, record: LogRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.clone()
    }

    pub fn to_text(&self) -> String {
        render_records(&self.records).expect("records should serialise")
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.to_text()).expect("failed to write log");
    }
}

/// Builder for `TaskInstance`.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: TaskInstance,
}

impl TaskBuilder {
    pub fn new(id: TaskId) -> Self {
        Self {
            task: TaskInstance::new(id, 0, format!("task-{id}")),
        }
    }

    pub fn task_type(mut self, task_type: TaskTypeId) -> Self {
        self.task.task_type = task_type;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.task.command = command.to_string();
        self
    }

    pub fn parent(mut self, parent: TaskId) -> Self {
        self.task.parents.push(parent);
        self
    }

    pub fn ready(mut self) -> Self {
        self.task.state = TaskState::Ready;
        self
    }

    pub fn state(mut self, state: TaskState) -> Self {
        self.task.state = state;
        self
    }

    pub fn build(self) -> TaskInstance {
        self.task
    }
}

/// `count` ready tasks with ids `first..first + count`, all of `task_type`.
pub fn ready_tasks(first: TaskId, count: u64, task_type: TaskTypeId) -> Vec<TaskInstance> {
    (first..first + count)
        .map(|id| TaskBuilder::new(id).task_type(task_type).ready().build())
        .collect()
}
