use super::*;
use crate::engine::test_helpers::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a router around a scripted engine.
/// The temp dir must be kept alive for the duration of the test.
async fn create_test_app(
    provider: Arc<ScriptedProvider>,
) -> (Router, Arc<TaskEngine>, tempfile::TempDir) {
    let (engine, temp_dir) = create_test_engine(provider).await;
    let engine = Arc::new(engine);
    let config = Arc::new(engine.config().clone());
    let app = create_router(engine.clone(), config);
    (app, engine, temp_dir)
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

const BOUNDARY: &str = "i2v-test-boundary";

/// Build a multipart/form-data POST /generate request
fn generate_request(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Number of files in the engine's upload directory
fn upload_count(engine: &TaskEngine) -> usize {
    std::fs::read_dir(engine.storage().upload_dir())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (engine, _temp_dir) = create_test_engine(ScriptedProvider::new()).await;
    let engine = Arc::new(engine);

    let mut config = engine.config().clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let engine = engine.clone();
        let config = config.clone();
        async move { start_api_server(engine, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be serving");
    api_handle.abort();
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let engine = Arc::new(
        TaskEngine::with_provider(config, ScriptedProvider::new())
            .await
            .unwrap(),
    );

    let api_handle = engine.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _engine, _temp_dir) = create_test_app(ScriptedProvider::new()).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (engine, _temp_dir) = create_test_engine(ScriptedProvider::new()).await;
    let engine = Arc::new(engine);
    let mut config = engine.config().clone();
    config.api.cors_enabled = false;
    let app = create_router(engine, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (engine, _temp_dir) = create_test_engine(ScriptedProvider::new()).await;
    let engine = Arc::new(engine);
    let mut config = engine.config().clone();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(engine, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://allowed.example"
    );

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://other.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _engine, _temp_dir) = create_test_app(ScriptedProvider::new()).await;
    let response = get(&app, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
