//! # i2v-engine
//!
//! Task orchestration for asynchronous image-to-video generation.
//!
//! A client uploads an image with generation parameters; the engine submits a job to a
//! remote provider (DashScope), tracks it with one poller per task until it finishes,
//! stores the resulting video locally and pushes change notifications to live listeners.
//! Tasks survive restarts through a JSON snapshot and in-flight tasks resume polling on
//! startup.
//!
//! ## Quick Start
//!
//! ```no_run
//! use i2v_engine::{Config, TaskEngine, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let engine = TaskEngine::new(config).await?;
//!     engine.recover().await;
//!
//!     // Listen for task changes
//!     let mut updates = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Some(notification) = updates.next().await {
//!             println!("Notification: {:?}", notification);
//!         }
//!     });
//!
//!     run_with_shutdown(engine).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Task engine (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Live change notifications
pub mod notify;
/// Remote generation provider client
pub mod provider;
/// Upload and output file storage
pub mod storage;
/// In-memory task registry with snapshot persistence
pub mod store;
/// Core types and notifications
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use engine::{AssetKind, TaskEngine};
pub use error::{
    ApiError, Error, ErrorDetail, ProviderError, Result, StoreError, ToHttpStatus,
    ValidationError,
};
pub use notify::{NotificationHub, Subscription};
pub use provider::{DashScopeClient, ProviderClient, RemoteStatus};
pub use storage::AssetStorage;
pub use store::TaskStore;
pub use types::{
    GenerationParams, Notification, NotificationKind, SubmitRequest, TaskId, TaskRecord,
    TaskStatus,
};

/// Helper function to run the engine with graceful signal handling.
///
/// Waits for a termination signal and then calls the engine's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use i2v_engine::{Config, TaskEngine, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = TaskEngine::new(Config::default()).await?;
///     engine.recover().await;
///
///     // Run with automatic signal handling
///     run_with_shutdown(engine).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: TaskEngine) -> Result<()> {
    wait_for_signal().await;
    engine.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
