//! System handlers: health, events, OpenAPI.

use super::HealthResponse;
use crate::api::AppState;
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider_configured: state.config.provider.credential().is_some(),
        listeners: state.engine.listener_count(),
        active_pollers: state.engine.active_pollers().await,
    })
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3 specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent events stream
///
/// The first event is `connected`. `tasks_updated` follows every task change and
/// `heartbeat` arrives every 25 seconds while the connection is open.
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "Event stream of task changes", content_type = "text/event-stream", body = crate::types::Notification)
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let notifications = state.engine.subscribe().into_stream();

    // The hub sends its own heartbeats, so no axum keep-alive is layered on top
    let sse_stream = notifications.filter_map(|notification| {
        match serde_json::to_string(&notification) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(notification.kind.as_str())
                .data(json_data))),
            Err(e) => {
                tracing::warn!("Failed to serialize notification to JSON: {}", e);
                None
            }
        }
    });

    Sse::new(sse_stream)
}
