//! Restoring tasks and their pollers after a restart.

use std::sync::atomic::Ordering;

use super::TaskEngine;

impl TaskEngine {
    /// Load the task snapshot and resume polling every unfinished task.
    ///
    /// Only the first call does anything; later calls return 0. Call it before accepting
    /// submissions, since loading replaces whatever the store holds. Tasks without a
    /// remote job id cannot be polled and keep their last known status.
    ///
    /// Returns the number of pollers started.
    pub async fn recover(&self) -> usize {
        if self
            .recovered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Recovery already ran, skipping");
            return 0;
        }

        let loaded = self.store.load_from_durable_storage().await;

        let mut resumed = 0;
        let mut frozen = 0;
        for task in self.store.list().await {
            if task.needs_polling() {
                if self.spawn_poller(task.id).await {
                    resumed += 1;
                }
            } else if !task.status.is_terminal() {
                tracing::warn!(task_id = %task.id, status = %task.status, "Unfinished task has no remote job id, leaving as is");
                frozen += 1;
            }
        }

        tracing::info!(loaded, resumed, frozen, "Task recovery complete");
        resumed
    }
}
