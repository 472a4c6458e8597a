//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Submission, status, listing, downloads and previews
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::{TaskId, TaskRecord};

mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works from the router
pub use system::*;
pub use tasks::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Multipart form accepted by POST /generate
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct GenerateForm {
    /// Source image (png, jpg or jpeg)
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// Prompt; a default motion prompt is used when blank
    pub prompt: Option<String>,
    /// Things the video should avoid
    pub negative_prompt: Option<String>,
    /// Provider model identifier
    pub model: Option<String>,
    /// Output resolution, e.g. "720P"
    pub resolution: Option<String>,
    /// "on" lets the provider rewrite the prompt
    pub prompt_extend: Option<String>,
}

/// Response body for POST /generate
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct GenerateResponse {
    /// Always true
    pub success: bool,
    /// Id of the new task
    pub task_id: TaskId,
}

/// Response body for GET /status/:id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskResponse {
    /// Always true
    pub success: bool,
    /// The task
    pub task: TaskRecord,
}

/// Response body for GET /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskListResponse {
    /// Always true
    pub success: bool,
    /// All tasks, newest first
    pub tasks: Vec<TaskRecord>,
}

/// Response body for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// "ok"
    pub status: String,
    /// Server version
    pub version: String,
    /// Whether a provider credential is configured
    pub provider_configured: bool,
    /// Connected event-stream listeners
    pub listeners: usize,
    /// Pollers currently tracking tasks
    pub active_pollers: usize,
}
