//! Task orchestration engine split into focused submodules.
//!
//! The `TaskEngine` struct and its methods are organized by concern:
//! - [`submit`] - Validation and submission of new tasks
//! - [`poller`] - Per-task polling state machine and asset retrieval
//! - [`recovery`] - Restoring tasks and pollers after a restart
//! - [`query`] - Read access to tasks and their assets
//! - [`lifecycle`] - Shutdown and API server startup

mod lifecycle;
mod poller;
mod query;
mod recovery;
mod submit;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use query::AssetKind;
pub(crate) use submit::validate_params;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::Result;
use crate::notify::{NotificationHub, Subscription};
use crate::provider::{DashScopeClient, ProviderClient};
use crate::storage::AssetStorage;
use crate::store::TaskStore;
use crate::types::{NotificationKind, TaskId};

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TaskEngine {
    /// Task registry; the in-memory copy is authoritative
    pub(crate) store: Arc<TaskStore>,
    /// Remote generation provider
    pub(crate) provider: Arc<dyn ProviderClient>,
    /// Upload and output directories
    pub(crate) storage: Arc<AssetStorage>,
    /// Live listeners
    pub(crate) hub: Arc<NotificationHub>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// One poller handle per task id; a live entry blocks a second poller
    pub(crate) pollers: Arc<tokio::sync::Mutex<HashMap<TaskId, JoinHandle<()>>>>,
    /// Set by the first `recover()` call
    pub(crate) recovered: Arc<AtomicBool>,
}

impl TaskEngine {
    /// Create an engine talking to DashScope.
    ///
    /// A missing API key is not an error here: submissions are rejected and polled
    /// tasks fail with `ConfigurationError` until one is configured.
    pub async fn new(config: Config) -> Result<Self> {
        if config.provider.credential().is_none() {
            tracing::warn!("DASHSCOPE_API_KEY is not set, video generation is unavailable");
        }
        let provider = DashScopeClient::new(&config.provider)?;
        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Create an engine around any provider implementation
    pub async fn with_provider(config: Config, provider: Arc<dyn ProviderClient>) -> Result<Self> {
        let storage = AssetStorage::new(&config.storage);
        storage.ensure_dirs().await?;

        let hub = NotificationHub::new(
            config.polling.listener_buffer,
            config.polling.keep_alive_interval,
        );

        Ok(Self {
            store: Arc::new(TaskStore::new(config.storage.tasks_file.clone())),
            provider,
            storage: Arc::new(storage),
            hub: Arc::new(hub),
            config: Arc::new(config),
            pollers: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            recovered: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register a live listener. The first event is `connected`.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// The engine's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Upload and output storage
    pub fn storage(&self) -> &AssetStorage {
        &self.storage
    }

    /// Number of registered live listeners
    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    /// Number of pollers currently running
    pub async fn active_pollers(&self) -> usize {
        self.pollers
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Persist the store and notify listeners after a task changed.
    ///
    /// A failed snapshot is logged and does not undo the in-memory change.
    pub(crate) async fn commit(&self, id: TaskId) {
        if let Err(e) = self.store.snapshot_to_durable_storage().await {
            tracing::error!(task_id = %id, error = %e, "Failed to write task snapshot");
        }
        self.hub.broadcast(NotificationKind::TasksUpdated);
    }
}
