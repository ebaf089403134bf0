// src/logs/record.rs

//! Log records: the JSON-lines wire format and its typed view.
//!
//! Every line is one object:
//!
//! ```json
//! {"timestamp":1000,"runId":"r1","taskId":7,"taskname":"align","invocId":3,
//!  "key":"invoc-time","value":{"realTime":420}}
//! ```
//!
//! `value` is either a raw scalar or a nested object. Linkage fields
//! (`runId`, `taskId`, `taskname`, `lang`, `invocId`) are optional.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, SchedError};
use crate::types::{ContainerId, InvocationId, TaskTypeId, Timestamp};

/// Semantic kind of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Invocation is ready to execute.
    InvocExec,
    /// Invocation finished executing; value carries `realTime`.
    InvocTime,
    InvocTimeSched,
    InvocTimeStagein,
    InvocTimeStageout,
    /// Host the invocation ran on (raw value).
    InvocHost,
    /// Size in bytes of one staged-in input file (raw value).
    FileSizeStagein,
    InvocOutput,
    /// Container lifecycle event from the resource manager.
    ClusterEvent,
    /// Workflow name; its timestamp marks the run onset.
    WorkflowName,
    /// Measured total runtime of the workflow (raw value, ms).
    WorkflowTime,
    /// Any key the passes do not interpret. Preserved verbatim.
    Other(String),
}

impl RecordKey {
    pub fn as_str(&self) -> &str {
        match self {
            RecordKey::InvocExec => "invoc-exec",
            RecordKey::InvocTime => "invoc-time",
            RecordKey::InvocTimeSched => "invoc-time-sched",
            RecordKey::InvocTimeStagein => "invoc-time-stagein",
            RecordKey::InvocTimeStageout => "invoc-time-stageout",
            RecordKey::InvocHost => "invoc-host",
            RecordKey::FileSizeStagein => "file-size-stagein",
            RecordKey::InvocOutput => "invoc-output",
            RecordKey::ClusterEvent => "cluster-event",
            RecordKey::WorkflowName => "wf-name",
            RecordKey::WorkflowTime => "wf-time",
            RecordKey::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "invoc-exec" => RecordKey::InvocExec,
            "invoc-time" => RecordKey::InvocTime,
            "invoc-time-sched" => RecordKey::InvocTimeSched,
            "invoc-time-stagein" => RecordKey::InvocTimeStagein,
            "invoc-time-stageout" => RecordKey::InvocTimeStageout,
            "invoc-host" => RecordKey::InvocHost,
            "file-size-stagein" => RecordKey::FileSizeStagein,
            "invoc-output" => RecordKey::InvocOutput,
            "cluster-event" => RecordKey::ClusterEvent,
            "wf-name" => RecordKey::WorkflowName,
            "wf-time" => RecordKey::WorkflowTime,
            other => RecordKey::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record payload: a raw scalar or a key/value map.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Raw(Value),
    Object(Map<String, Value>),
}

impl RecordValue {
    fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => RecordValue::Object(map),
            other => RecordValue::Raw(other),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            RecordValue::Raw(v) => v.clone(),
            RecordValue::Object(map) => Value::Object(map.clone()),
        }
    }

    /// Raw scalar rendered as a string (strings are returned unquoted).
    pub fn raw_str(&self) -> Result<String> {
        match self {
            RecordValue::Raw(Value::String(s)) => Ok(s.clone()),
            RecordValue::Raw(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
            other => Err(SchedError::MalformedRecord(format!(
                "expected a raw scalar value, got {other:?}"
            ))),
        }
    }

    /// Raw scalar parsed as an unsigned integer (accepts `42` and `"42"`).
    pub fn raw_u64(&self) -> Result<u64> {
        let s = self.raw_str()?;
        s.trim()
            .parse::<u64>()
            .map_err(|e| SchedError::MalformedRecord(format!("expected integer value, got {s:?}: {e}")))
    }

    pub fn object(&self) -> Result<&Map<String, Value>> {
        match self {
            RecordValue::Object(map) => Ok(map),
            RecordValue::Raw(v) => Err(SchedError::MalformedRecord(format!(
                "expected an object value, got {v}"
            ))),
        }
    }

    pub fn field_str(&self, name: &str) -> Result<&str> {
        self.object()?
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| SchedError::MalformedRecord(format!("missing string field `{name}`")))
    }

    pub fn field_i64(&self, name: &str) -> Result<i64> {
        let field = self
            .object()?
            .get(name)
            .ok_or_else(|| SchedError::MalformedRecord(format!("missing integer field `{name}`")))?;
        match field {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| SchedError::MalformedRecord(format!("field `{name}` is not an integer: {field}")))
    }

    /// `realTime` of a timed record, in milliseconds.
    pub fn real_time(&self) -> Result<u64> {
        let ms = self.field_i64("realTime")?;
        u64::try_from(ms)
            .map_err(|_| SchedError::MalformedRecord(format!("negative realTime {ms}")))
    }
}

/// Cross-reference fields tying a record to an invocation and task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Linkage {
    pub invocation_id: Option<InvocationId>,
    pub task_type_id: Option<TaskTypeId>,
    pub task_name: Option<String>,
    pub lang: Option<String>,
}

/// Interpreted value of a `cluster-event` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEventKind {
    Requested,
    Allocated { container_id: ContainerId },
    Completed { container_id: ContainerId, exit_code: i64 },
    Other(String),
}

/// One lifecycle event from a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub key: RecordKey,
    pub value: RecordValue,
    pub run_id: Option<String>,
    pub linkage: Linkage,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    timestamp: u64,
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    task_id: Option<u64>,
    #[serde(rename = "taskname", default, skip_serializing_if = "Option::is_none")]
    task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lang: Option<String>,
    #[serde(rename = "invocId", default, skip_serializing_if = "Option::is_none")]
    invoc_id: Option<u64>,
    key: String,
    value: Value,
}

/// Identity of an observed event; see [`LogRecord::identity`].
pub type RecordIdentity = (Timestamp, String, String, Option<InvocationId>);

impl LogRecord {
    /// Two records with the same timestamp, key, value and invocation are
    /// copies of one event, whatever their run id or other linkage says.
    pub fn identity(&self) -> RecordIdentity {
        (
            self.timestamp,
            self.key.as_str().to_string(),
            self.value.to_json().to_string(),
            self.linkage.invocation_id,
        )
    }

    pub fn new(timestamp: Timestamp, key: RecordKey, value: Value) -> Self {
        Self {
            timestamp,
            key,
            value: RecordValue::from_json(value),
            run_id: None,
            linkage: Linkage::default(),
        }
    }

    /// Parse one JSON line.
    pub fn parse_line(line: &str) -> Result<Self> {
        let wire: WireRecord = serde_json::from_str(line)
            .map_err(|e| SchedError::MalformedRecord(format!("{e}: {line}")))?;

        Ok(Self {
            timestamp: wire.timestamp,
            key: RecordKey::parse(&wire.key),
            value: RecordValue::from_json(wire.value),
            run_id: wire.run_id,
            linkage: Linkage {
                invocation_id: wire.invoc_id,
                task_type_id: wire.task_id,
                task_name: wire.task_name,
                lang: wire.lang,
            },
        })
    }

    /// Serialise back to one JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        let wire = WireRecord {
            timestamp: self.timestamp,
            run_id: self.run_id.clone(),
            task_id: self.linkage.task_type_id,
            task_name: self.linkage.task_name.clone(),
            lang: self.linkage.lang.clone(),
            invoc_id: self.linkage.invocation_id,
            key: self.key.as_str().to_string(),
            value: self.value.to_json(),
        };
        serde_json::to_string(&wire).map_err(|e| SchedError::Other(e.into()))
    }

    /// Copy of this record with the given linkage attached.
    ///
    /// Fields present in `linkage` win; fields it lacks keep their current value.
    pub fn with_linkage(&self, linkage: &Linkage) -> Self {
        let mut linked = self.clone();
        linked.linkage = Linkage {
            invocation_id: linkage.invocation_id.or(self.linkage.invocation_id),
            task_type_id: linkage.task_type_id.or(self.linkage.task_type_id),
            task_name: linkage.task_name.clone().or_else(|| self.linkage.task_name.clone()),
            lang: linkage.lang.clone().or_else(|| self.linkage.lang.clone()),
        };
        linked
    }

    /// Interpret a `cluster-event` record. Returns `None` for other keys.
    pub fn cluster_event(&self) -> Result<Option<ClusterEventKind>> {
        if self.key != RecordKey::ClusterEvent {
            return Ok(None);
        }

        let kind = match self.value.field_str("type")? {
            "container-requested" => ClusterEventKind::Requested,
            "container-allocated" => ClusterEventKind::Allocated {
                container_id: self.value.field_str("container-id")?.to_string(),
            },
            "container-completed" => ClusterEventKind::Completed {
                container_id: self.value.field_str("container-id")?.to_string(),
                exit_code: self.value.field_i64("exit-code")?,
            },
            other => ClusterEventKind::Other(other.to_string()),
        };
        Ok(Some(kind))
    }
}

/// Parse a whole log (one record per non-empty line).
pub fn parse_records(text: &str) -> Result<Vec<LogRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            LogRecord::parse_line(line).map_err(|e| match e {
                SchedError::MalformedRecord(msg) => {
                    SchedError::MalformedRecord(format!("line {}: {msg}", idx + 1))
                }
                other => other,
            })
        })
        .collect()
}

pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_records(&contents)
}

/// Render records as JSON lines, one per record, newline-terminated.
pub fn render_records<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_line()?);
        out.push('\n');
    }
    Ok(out)
}
