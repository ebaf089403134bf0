// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;

use super::core::CoreRuntime;
use super::{ClusterBackend, ClusterEvent, CoreCommand};

/// Feeds `ClusterEvent`s into the [`CoreRuntime`] and carries out the
/// resulting commands on a [`ClusterBackend`].
pub struct Runtime<B: ClusterBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<ClusterEvent>,
    backend: B,
}

impl<B: ClusterBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: ClusterBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<ClusterEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop. Returns the backend so callers can inspect it.
    pub async fn run(mut self) -> Result<B> {
        info!(
            policy = self.core.scheduler().policy_name(),
            "scheduler runtime started"
        );

        loop {
            let Some(event) = self.event_rx.recv().await else {
                info!("cluster event channel closed; exiting");
                break;
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event)?;
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        let progress = self.core.scheduler().progress();
        info!(
            finished = progress.finished_this_run(),
            aborted = progress.aborted,
            remaining = progress.remaining,
            "runtime exiting"
        );
        Ok(self.backend)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::RequestContainers(requests) => {
                self.backend.request_containers(requests).await
            }
            CoreCommand::Launch { container, task } => {
                debug!(task = %task, container = %container, "launching task");
                self.backend.launch(container, task).await
            }
            CoreCommand::Release(containers) => self.backend.release(containers).await,
            CoreCommand::TaskAborted(task) => {
                warn!(task, "task aborted after exhausting retries");
                self.backend.task_aborted(task).await
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
                Ok(())
            }
        }
    }
}
