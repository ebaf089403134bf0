// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Unparseable or structurally invalid log record. Fatal to the run's
    /// reconstruction.
    #[error("Malformed log record: {0}")]
    MalformedRecord(String),

    /// A cross-reference between log substreams underflowed or found no match.
    #[error("Log reconciliation mismatch: {0}")]
    ReconciliationMismatch(String),

    /// Dequeue from an empty node-request or ready queue. Callers are expected
    /// to check emptiness first.
    #[error("Empty queue: {0}")]
    EmptyQueue(&'static str),

    #[error("Statistics store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Task not found: {0}")]
    UnknownTask(TaskId),

    /// Scheduler bookkeeping is inconsistent (e.g. assigning a task that is
    /// not ready). Not recoverable.
    #[error("Scheduler invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedError>;
