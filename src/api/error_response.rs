//! HTTP error response handling for the API
//!
//! This module provides conversions from domain errors to HTTP responses
//! with appropriate status codes and JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ValidationError};
    use crate::types::TaskId;

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_task_not_found_into_response() {
        let id = TaskId::new();
        let response = Error::TaskNotFound(id).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "task_not_found");
        assert_eq!(api_error.error.details.unwrap()["task_id"], id.to_string());
    }

    #[tokio::test]
    async fn test_validation_error_into_response() {
        let response = Error::Validation(ValidationError::UnsupportedResolution {
            model: "wanx2.1-i2v-plus".into(),
            resolution: "480P".into(),
            supported: "720P".into(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "validation_error");
        assert!(api_error.error.message.contains("720P"));
    }

    #[tokio::test]
    async fn test_not_ready_into_response() {
        let response = Error::TaskNotReady {
            id: TaskId::new(),
            status: "RUNNING".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.details.unwrap()["status"], "RUNNING");
    }

    #[tokio::test]
    async fn test_provider_timeout_into_response() {
        let response =
            Error::Provider(ProviderError::Timeout(std::time::Duration::from_secs(300)))
                .into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
