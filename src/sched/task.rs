// src/sched/task.rs

//! Task instances and their lifecycle state machine.

use std::fmt;

use crate::errors::{Result, SchedError};
use crate::types::{TaskId, TaskTypeId};

/// Lifecycle state of a task.
///
/// ```text
/// NotReady -> Ready -> Running -> Completed
///               ^         |
///               |         v
///               +----- Failed -> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting on data dependencies.
    NotReady,
    /// Eligible for assignment to a container.
    Ready,
    /// Assigned to a container.
    Running,
    Completed,
    /// Transient: the attempt failed and the retry decision is pending.
    Failed,
    /// Retry budget exhausted. Dependents will never run.
    Aborted,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Aborted)
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (NotReady, Ready)
                | (Ready, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Ready)
                | (Failed, Aborted)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::NotReady => "not-ready",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// A unit of schedulable work.
///
/// Parent and child edges are task ids; the DAG itself belongs to whoever
/// parsed the workflow. The scheduler only tracks state and tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInstance {
    pub workflow_id: String,
    pub id: TaskId,
    pub task_type: TaskTypeId,
    pub name: String,
    pub command: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub parents: Vec<TaskId>,
    pub children: Vec<TaskId>,
    /// Number of times the task has been assigned to a container.
    pub tries: u32,
    pub state: TaskState,
}

impl TaskInstance {
    pub fn new(id: TaskId, task_type: TaskTypeId, name: impl Into<String>) -> Self {
        Self {
            workflow_id: String::new(),
            id,
            task_type,
            name: name.into(),
            command: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            tries: 0,
            state: TaskState::NotReady,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SchedError::InvariantViolation(format!(
                "task {} cannot go from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

impl fmt::Display for TaskInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.id)
    }
}

/// What happened to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back in the ready queue; a new node request was enqueued.
    Retrying { attempts: u32 },
    /// Permanently aborted. The workflow layer must abort dependents.
    RetryExhausted { attempts: u32 },
}
