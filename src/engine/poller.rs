//! Per-task polling state machine.
//!
//! A poller owns one task from submission (or recovery) until the task reaches a
//! terminal status. Each cycle reads the task, asks the provider where the job stands
//! and applies at most one transition. Only transitions are persisted and broadcast.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures::FutureExt;

use super::TaskEngine;
use crate::error::{ProviderError, Result, StoreError};
use crate::provider::RemoteStatus;
use crate::types::{TaskId, TaskRecord, error_codes};

/// What the poller does after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// Sleep one poll interval and run again
    Continue,
    /// The task is terminal or gone
    Stop,
}

impl TaskEngine {
    /// Start a poller for `id` unless one is already running.
    ///
    /// Returns whether a new poller was started.
    pub(crate) async fn spawn_poller(&self, id: TaskId) -> bool {
        let mut pollers = self.pollers.lock().await;
        if let Some(handle) = pollers.get(&id)
            && !handle.is_finished()
        {
            tracing::debug!(task_id = %id, "Poller already running");
            return false;
        }

        // The registry lock is held until the handle is stored, so the poller's own
        // cleanup at exit cannot run before the insert
        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.run_poller(id).await });
        pollers.insert(id, handle);
        true
    }

    async fn run_poller(self, id: TaskId) {
        tracing::info!(task_id = %id, "Poller started");
        let poll_interval = self.config.polling.poll_interval;

        loop {
            let cycle = AssertUnwindSafe(self.poll_cycle(id)).catch_unwind().await;
            let outcome = match cycle {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    self.fail_internal(id, e.to_string()).await;
                    CycleOutcome::Stop
                }
                Err(panic) => {
                    self.fail_internal(id, panic_message(panic.as_ref())).await;
                    CycleOutcome::Stop
                }
            };

            if outcome == CycleOutcome::Stop {
                break;
            }
            tokio::time::sleep(poll_interval).await;
        }

        self.pollers.lock().await.remove(&id);
        tracing::info!(task_id = %id, "Poller stopped");
    }

    /// One observation of the remote job
    pub(crate) async fn poll_cycle(&self, id: TaskId) -> Result<CycleOutcome> {
        let task = match self.store.get(&id).await {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(task_id = %id, "Task no longer exists, stopping poller");
                return Ok(CycleOutcome::Stop);
            }
            Err(e) => return Err(e.into()),
        };

        if task.status.is_terminal() {
            // Make sure the final state reached disk and listeners
            self.commit(id).await;
            return Ok(CycleOutcome::Stop);
        }

        let Some(remote_job_id) = task.remote_job_id.clone() else {
            tracing::warn!(task_id = %id, "Task has no remote job id, nothing to poll");
            return Ok(CycleOutcome::Stop);
        };

        match self.provider.poll(&remote_job_id).await {
            Ok(RemoteStatus::Running { message }) => {
                // A new message without a status change stays in memory only
                let changed = self
                    .store
                    .update(&id, move |task| {
                        if message.is_some() {
                            task.message = message;
                        }
                        task.mark_running()
                    })
                    .await?;
                if changed {
                    tracing::info!(task_id = %id, %remote_job_id, "Task running");
                    self.commit(id).await;
                }
                Ok(CycleOutcome::Continue)
            }
            Ok(RemoteStatus::Succeeded {
                result_url: Some(url),
            }) => {
                self.complete_with_asset(id, url).await?;
                Ok(CycleOutcome::Stop)
            }
            Ok(RemoteStatus::Succeeded { result_url: None }) => {
                tracing::warn!(task_id = %id, "Provider reported success without a result URL");
                self.finish(id, |task| task.mark_succeeded(None, None)).await?;
                Ok(CycleOutcome::Stop)
            }
            Ok(RemoteStatus::Failed { code, message }) => {
                let code = code.unwrap_or_else(|| error_codes::UNKNOWN_ERROR.to_string());
                let message = message.unwrap_or_else(|| "task failed".to_string());
                self.finish(id, move |task| task.mark_failed(code, message))
                    .await?;
                Ok(CycleOutcome::Stop)
            }
            Ok(RemoteStatus::NotFound) => {
                let message = format!("remote job {remote_job_id} not found");
                self.finish(id, move |task| {
                    task.mark_failed(error_codes::REMOTE_JOB_NOT_FOUND, message)
                })
                .await?;
                Ok(CycleOutcome::Stop)
            }
            Err(ProviderError::Unconfigured) => {
                let message = ProviderError::Unconfigured.to_string();
                self.finish(id, move |task| {
                    task.mark_failed(error_codes::CONFIGURATION_ERROR, message)
                })
                .await?;
                Ok(CycleOutcome::Stop)
            }
            Err(e) => {
                tracing::warn!(task_id = %id, %remote_job_id, error = %e, "Status check failed, retrying");
                Ok(CycleOutcome::Continue)
            }
        }
    }

    /// Retrieve the finished video, then mark the task succeeded or failed
    async fn complete_with_asset(&self, id: TaskId, url: String) -> Result<()> {
        match self.retrieve_asset(id, &url).await {
            Ok(path) => {
                self.finish(id, move |task| task.mark_succeeded(Some(url), Some(path)))
                    .await
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Result retrieval failed");
                let message = format!("failed to retrieve result: {e}");
                self.finish(id, move |task| {
                    let changed = task.mark_failed(error_codes::ASSET_RETRIEVAL_FAILED, message);
                    if changed {
                        task.result_asset_url = Some(url);
                    }
                    changed
                })
                .await
            }
        }
    }

    /// Stream a result asset to local storage within the configured time budget
    pub(crate) async fn retrieve_asset(
        &self,
        id: TaskId,
        url: &str,
    ) -> std::result::Result<PathBuf, ProviderError> {
        let budget = self.config.provider.download_timeout;
        let retrieval = async {
            let stream = self.provider.fetch(url).await?;
            self.storage.write_output(&id, stream).await
        };

        // Dropping the retrieval on timeout removes its partial file
        tokio::time::timeout(budget, retrieval)
            .await
            .unwrap_or(Err(ProviderError::Timeout(budget)))
    }

    /// Apply a terminal transition; persist and broadcast only if it took effect
    async fn finish<F>(&self, id: TaskId, transition: F) -> Result<()>
    where
        F: FnOnce(&mut TaskRecord) -> bool,
    {
        if self.store.update(&id, transition).await? {
            if let Ok(task) = self.store.get(&id).await {
                tracing::info!(
                    task_id = %id,
                    status = %task.status,
                    error_code = task.error_code.as_deref().unwrap_or(""),
                    "Task finished"
                );
            }
            self.commit(id).await;
        }
        Ok(())
    }

    /// Record an unexpected poller failure on the task
    async fn fail_internal(&self, id: TaskId, message: String) {
        tracing::error!(task_id = %id, error = %message, "Poller failed unexpectedly");
        match self
            .store
            .update(&id, |task| task.mark_failed(error_codes::INTERNAL_ERROR, message))
            .await
        {
            Ok(true) => self.commit(id).await,
            Ok(false) => {}
            Err(e) => tracing::error!(task_id = %id, error = %e, "Could not record poller failure"),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("poller panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("poller panicked: {s}")
    } else {
        "poller panicked".to_string()
    }
}
