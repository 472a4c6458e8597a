//! REST API server module
//!
//! Exposes task submission, status queries, asset downloads and a server-sent
//! event stream of task changes.

use crate::{Config, Result, TaskEngine};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Headroom for multipart framing and text fields on top of the image itself
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `POST /generate` - Upload an image and start a generation (multipart)
/// - `GET /status/:id` - Get one task
/// - `GET /tasks` - List all tasks
/// - `GET /download/:id` - Download the generated video
/// - `GET /preview/:id/:file_type` - Preview the input image or output video
///
/// ## System
/// - `GET /events` - Server-sent events stream
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(engine: Arc<TaskEngine>, config: Arc<Config>) -> Router {
    let state = AppState::new(engine, config.clone());
    let body_limit = usize::try_from(config.storage.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let router = Router::new()
        // Tasks
        .route("/generate", post(routes::generate))
        .route("/status/:id", get(routes::get_status))
        .route("/tasks", get(routes::list_tasks))
        .route("/download/:id", get(routes::download_video))
        .route("/preview/:id/:file_type", get(routes::preview_file))
        // System
        .route("/events", get(routes::event_stream))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the listener fails or the task is aborted.
///
/// # Example
///
/// ```no_run
/// use i2v_engine::{Config, TaskEngine};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let engine = Arc::new(TaskEngine::new((*config).clone()).await?);
///
/// i2v_engine::api::start_api_server(engine, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(engine: Arc<TaskEngine>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(engine, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
