//! Shutdown and API server startup.

use std::sync::Arc;

use crate::error::Result;

use super::TaskEngine;

impl TaskEngine {
    /// Stop all pollers and write a final snapshot.
    ///
    /// Pollers are aborted between awaits, so no task is left half-updated. Tasks that
    /// were still in flight resume on the next start through [`TaskEngine::recover`].
    ///
    /// # Errors
    ///
    /// Returns an error if the final snapshot cannot be written.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating shutdown");

        let handles: Vec<_> = self.pollers.lock().await.drain().collect();
        let aborted = handles.len();
        for (id, handle) in handles {
            tracing::debug!(task_id = %id, "Stopping poller");
            handle.abort();
        }
        tracing::info!(aborted, "Pollers stopped");

        let count = self.store.snapshot_to_durable_storage().await?;
        tracing::info!(count, "Final task snapshot written");
        Ok(())
    }

    /// Spawn the API server in a background task.
    ///
    /// Returns a handle that resolves when the server stops.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let engine = Arc::clone(self);
        let config = Arc::clone(&self.config);
        tokio::spawn(async move { crate::api::start_api_server(engine, config).await })
    }
}
