//! i2v-server binary
//!
//! Loads configuration from the environment (and `.env`), restores persisted tasks,
//! serves the REST API and shuts down cleanly on SIGINT/SIGTERM.

use std::sync::Arc;

use i2v_engine::{Config, TaskEngine, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    tracing::info!(
        upload_dir = %config.storage.upload_dir.display(),
        output_dir = %config.storage.output_dir.display(),
        tasks_file = %config.storage.tasks_file.display(),
        "Configuration loaded"
    );

    let engine = Arc::new(TaskEngine::new(config).await?);
    let resumed = engine.recover().await;
    tracing::info!(resumed, "Task recovery finished");

    let api_handle = engine.spawn_api_server();

    let result = run_with_shutdown(engine.as_ref().clone()).await;
    api_handle.abort();

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
