// src/engine/backend.rs

//! Pluggable cluster backend.
//!
//! The runtime talks to a `ClusterBackend` instead of a concrete resource
//! manager client, so tests can plug in a simulated cluster that answers
//! requests with `ClusterEvent`s of its own.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::sched::TaskInstance;
use crate::types::{Container, ContainerId, NodeRequest, TaskId};

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait ClusterBackend: Send {
    /// Ask for one container per request. Grants come back later as
    /// `ClusterEvent::ContainerAllocated`.
    fn request_containers(&mut self, requests: Vec<NodeRequest>) -> BackendFuture<'_>;

    /// Start `task` inside `container`.
    fn launch(&mut self, container: Container, task: TaskInstance) -> BackendFuture<'_>;

    /// Return containers to the resource manager.
    fn release(&mut self, containers: Vec<ContainerId>) -> BackendFuture<'_>;

    /// A task was aborted for good. Backends that track the workflow DAG
    /// abort its dependents here.
    fn task_aborted(&mut self, _task: TaskId) -> BackendFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}
