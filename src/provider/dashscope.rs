//! DashScope async video-synthesis client
//!
//! Jobs are submitted with `X-DashScope-Async: enable` and polled through the generic
//! task endpoint. Result videos live on pre-signed URLs and are fetched without the
//! API credential.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;

use super::{AssetStream, ProviderClient, RemoteStatus, SubmitJob};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const SYNTHESIS_PATH: &str = "/services/aigc/video-generation/video-synthesis";

/// HTTP client for the DashScope API
pub struct DashScopeClient {
    client: reqwest::Client,
    /// No total timeout here; asset retrieval is bounded by the caller
    download_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    output: SubmitOutput,
}

#[derive(Debug, Deserialize)]
struct SubmitOutput {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    output: TaskOutput,
}

#[derive(Debug, Deserialize)]
struct TaskOutput {
    task_status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl DashScopeClient {
    /// Build a client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let download_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            download_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.credential().map(str::to_string),
        })
    }

    fn credential(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::Unconfigured)
    }

    fn submit_body(job: &SubmitJob) -> serde_json::Value {
        let mut input = serde_json::json!({
            "prompt": job.params.prompt,
            "img_url": job.image_data_url,
        });
        if let Some(negative) = job.params.negative_prompt.as_deref().filter(|s| !s.is_empty()) {
            input["negative_prompt"] = serde_json::Value::String(negative.to_string());
        }

        serde_json::json!({
            "model": job.params.model,
            "input": input,
            "parameters": {
                "resolution": job.params.resolution,
                "prompt_extend": job.params.prompt_extend,
            },
        })
    }

    /// Map a non-2xx response to [`ProviderError::Api`], keeping the provider's code and
    /// message when the body carries them
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

        Err(ProviderError::Api {
            status: status.as_u16(),
            code: parsed.code,
            message: parsed.message.unwrap_or(body),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

fn map_task_output(output: TaskOutput) -> RemoteStatus {
    match output.task_status.as_str() {
        "PENDING" | "RUNNING" | "SUSPENDED" => RemoteStatus::Running {
            message: output.message,
        },
        "SUCCEEDED" => RemoteStatus::Succeeded {
            result_url: output.video_url.filter(|url| !url.is_empty()),
        },
        "FAILED" | "CANCELED" => RemoteStatus::Failed {
            code: output.code,
            message: output.message,
        },
        "UNKNOWN" => RemoteStatus::NotFound,
        other => {
            // Unrecognized statuses are treated as still in flight
            tracing::warn!(task_status = other, "Unrecognized provider task status");
            RemoteStatus::Running {
                message: output.message,
            }
        }
    }
}

#[async_trait]
impl ProviderClient for DashScopeClient {
    async fn submit(&self, job: &SubmitJob) -> Result<String, ProviderError> {
        let key = self.credential()?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, SYNTHESIS_PATH))
            .bearer_auth(key)
            .header("X-DashScope-Async", "enable")
            .json(&Self::submit_body(job))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let parsed: SubmitResponse = Self::decode(response).await?;

        tracing::debug!(remote_job_id = %parsed.output.task_id, model = %job.params.model, "Job submitted");
        Ok(parsed.output.task_id)
    }

    async fn poll(&self, remote_job_id: &str) -> Result<RemoteStatus, ProviderError> {
        let key = self.credential()?;

        let response = self
            .client
            .get(format!("{}/tasks/{}", self.base_url, remote_job_id))
            .bearer_auth(key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(RemoteStatus::NotFound);
        }
        let response = Self::ensure_success(response).await?;
        let parsed: TaskResponse = Self::decode(response).await?;

        Ok(map_task_output(parsed.output))
    }

    async fn fetch(&self, result_url: &str) -> Result<AssetStream, ProviderError> {
        let response = self.download_client.get(result_url).send().await?;
        let response = Self::ensure_success(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from))
            .boxed())
    }
}
