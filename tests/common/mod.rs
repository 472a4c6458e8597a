//! Common test utilities for i2v-engine integration tests
//!
//! Every test talks to a wiremock stand-in for the DashScope API, so no network
//! access or credentials are needed.

#![allow(dead_code)]

use i2v_engine::{Config, TaskEngine, TaskId, TaskRecord};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// DashScope endpoint that accepts new jobs
pub const SYNTHESIS_PATH: &str = "/services/aigc/video-generation/video-synthesis";

/// API key the mock expects
pub const TEST_API_KEY: &str = "sk-test";

/// Minimal PNG signature, enough for extension-based validation
pub const SAMPLE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Payload served as the generated video
pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42-integration-video";

/// A mock DashScope server
pub struct MockDashScope {
    pub server: MockServer,
}

impl MockDashScope {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to configure the engine with
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Absolute URL for a path on the mock
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Accept every submission and hand out `remote_id`
    pub async fn accept_submissions(&self, remote_id: &str) {
        Mock::given(method("POST"))
            .and(path(SYNTHESIS_PATH))
            .and(header("authorization", format!("Bearer {TEST_API_KEY}").as_str()))
            .and(header("X-DashScope-Async", "enable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "request_id": "req-submit",
                "output": { "task_id": remote_id, "task_status": "PENDING" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer the first `times` polls of `remote_id` with `output`
    pub async fn task_status_times(&self, remote_id: &str, output: serde_json::Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/tasks/{remote_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "request_id": "req-poll",
                "output": output
            })))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Answer every remaining poll of `remote_id` with `output`
    pub async fn task_status(&self, remote_id: &str, output: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/tasks/{remote_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "request_id": "req-poll",
                "output": output
            })))
            .mount(&self.server)
            .await;
    }

    /// The provider has forgotten `remote_id`
    pub async fn task_not_found(&self, remote_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/tasks/{remote_id}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "request_id": "req-poll",
                "code": "NotFound",
                "message": "task not found"
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve a result asset at `asset_path` with the given status
    pub async fn asset(&self, asset_path: &str, status: u16, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(asset_path))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
            .mount(&self.server)
            .await;
    }

    /// Number of submissions the mock received
    pub async fn submission_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == SYNTHESIS_PATH)
            .count()
    }
}

/// Configuration rooted in `root`, pointing at the mock with fast polling
pub fn test_config(root: &Path, base_url: &str) -> Config {
    let mut config = Config::default();
    config.provider.base_url = base_url.to_string();
    config.provider.api_key = Some(TEST_API_KEY.to_string());
    config.provider.download_timeout = Duration::from_secs(5);
    config.storage.upload_dir = root.join("uploads");
    config.storage.output_dir = root.join("downloads");
    config.storage.tasks_file = root.join("tasks.json");
    config.polling.poll_interval = Duration::from_millis(20);
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    config
}

/// Engine using the real DashScope client against the mock
pub async fn create_engine(root: &Path, mock: &MockDashScope) -> TaskEngine {
    TaskEngine::new(test_config(root, &mock.base_url()))
        .await
        .unwrap()
}

/// Store a sample image through the engine's upload storage
pub async fn stored_image(engine: &TaskEngine) -> PathBuf {
    engine
        .storage()
        .save_upload("cat.png", SAMPLE_PNG)
        .await
        .unwrap()
}

/// Poll the engine until the task is terminal or `timeout` passes
pub async fn wait_for_terminal(engine: &TaskEngine, id: TaskId, timeout: Duration) -> TaskRecord {
    tokio::time::timeout(timeout, async {
        loop {
            let task = engine.get_task(id).await.unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("task {id} did not finish within {timeout:?}"))
}

/// Wait until no poller is running, i.e. every terminal commit has been written
pub async fn wait_for_idle(engine: &TaskEngine) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.active_pollers().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("pollers still running after 5s"));
}
