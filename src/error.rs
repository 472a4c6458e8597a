//! Error types for i2v-engine
//!
//! This module provides:
//! - The top-level [`Error`] returned by engine operations
//! - Domain errors for the task store, the provider client and request validation
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Errors that happen inside a poller never surface here; they are recorded on the
//! task itself (see [`crate::types::error_codes`]).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::TaskId;

/// Result type alias for i2v-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for i2v-engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "DASHSCOPE_API_KEY")
        key: Option<String>,
    },

    /// The submitted request was rejected before any task was created
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Task store operation failed
    #[error("task store error: {0}")]
    Store(#[from] StoreError),

    /// The remote generation provider rejected or failed a call
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Unknown task id
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// A task id that cannot name any task
    #[error("task {0} not found")]
    InvalidTaskId(String),

    /// Task exists but has not produced its result yet
    #[error("task {id} is {status}, result not available")]
    TaskNotReady {
        /// The task that was queried
        id: TaskId,
        /// Its current status
        status: String,
    },

    /// The task has no local file for the requested asset
    #[error("asset not found for task {id}: {what}")]
    AssetMissing {
        /// The task that was queried
        id: TaskId,
        /// Which asset was requested ("input", "output")
        what: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Task store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists
    #[error("duplicate task id {0}")]
    DuplicateId(TaskId),

    /// No record with this id
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Writing or reading the snapshot file failed
    #[error("snapshot I/O failed for {path}: {source}")]
    Snapshot {
        /// Snapshot file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from the remote generation provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No credential configured; never retried
    #[error("provider credential is not configured")]
    Unconfigured,

    /// The HTTP request itself failed (network, DNS, TLS, timeout)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code
    #[error("provider returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error code, if present in the body
        code: Option<String>,
        /// Provider message or raw body
        message: String,
    },

    /// The response body did not have the expected shape
    #[error("unexpected provider response: {0}")]
    Decode(String),

    /// A streamed asset could not be written locally
    #[error("failed to write asset: {0}")]
    Write(#[from] std::io::Error),

    /// Asset retrieval exceeded its time budget
    #[error("asset retrieval timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Reasons a submission is rejected up front
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The model does not support the requested resolution
    #[error("model {model} does not support resolution {resolution}; supported: {supported}")]
    UnsupportedResolution {
        /// Requested model
        model: String,
        /// Requested resolution
        resolution: String,
        /// Comma-separated supported resolutions
        supported: String,
    },

    /// No image was supplied
    #[error("no image provided")]
    MissingImage,

    /// The image has an extension outside png/jpg/jpeg
    #[error("unsupported image format: {0}")]
    UnsupportedImage(String),

    /// The uploaded image exceeds the configured limit
    #[error("image is {size} bytes, limit is {limit} bytes")]
    ImageTooLarge {
        /// Upload size
        size: u64,
        /// Configured maximum
        limit: u64,
    },

    /// The stored image reference does not exist
    #[error("image not found at {0}")]
    ImageNotFound(PathBuf),

    /// The request form could not be read
    #[error("invalid form data: {0}")]
    InvalidForm(String),
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task 3f0c... not found",
///     "details": { "task_id": "3f0c..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,

            Error::TaskNotFound(_) => 404,
            Error::InvalidTaskId(_) => 404,
            Error::AssetMissing { .. } => 404,
            Error::Store(StoreError::NotFound(_)) => 404,

            Error::TaskNotReady { .. } => 409,
            Error::Store(StoreError::DuplicateId(_)) => 409,

            // Missing credential: the service cannot do its job until reconfigured
            Error::Config { .. } => 503,
            Error::Provider(ProviderError::Unconfigured) => 503,

            // Pass the provider's own client errors through, everything else is a bad gateway
            Error::Provider(ProviderError::Api { status, .. }) if (400..500).contains(status) => {
                *status
            }
            Error::Provider(ProviderError::Timeout(_)) => 504,
            Error::Provider(_) => 502,

            Error::Store(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Store(StoreError::NotFound(_)) => "task_not_found",
            Error::Store(StoreError::DuplicateId(_)) => "duplicate_task",
            Error::Store(_) => "store_error",
            Error::Provider(ProviderError::Unconfigured) => "config_error",
            Error::Provider(ProviderError::Timeout(_)) => "provider_timeout",
            Error::Provider(_) => "provider_error",
            Error::TaskNotFound(_) | Error::InvalidTaskId(_) => "task_not_found",
            Error::TaskNotReady { .. } => "task_not_ready",
            Error::AssetMissing { .. } => "asset_missing",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::TaskNotFound(id) | Error::Store(StoreError::NotFound(id)) => {
                Some(serde_json::json!({ "task_id": id }))
            }
            Error::InvalidTaskId(raw) => Some(serde_json::json!({ "task_id": raw })),
            Error::TaskNotReady { id, status } => Some(serde_json::json!({
                "task_id": id,
                "status": status,
            })),
            Error::AssetMissing { id, what } => Some(serde_json::json!({
                "task_id": id,
                "asset": what,
            })),
            Error::Provider(ProviderError::Api {
                status,
                code: Some(provider_code),
                ..
            }) => Some(serde_json::json!({
                "provider_status": status,
                "provider_code": provider_code,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
