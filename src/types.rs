//! Core types for i2v-engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct TaskId(pub uuid::Uuid);

impl TaskId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Task status
///
/// `PENDING` and `RUNNING` are in flight; `SUCCEEDED` and `FAILED` are terminal and sticky.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Submitted to the provider, not yet observed running
    Pending,
    /// The provider reports the job queued or running
    Running,
    /// Finished and (when the provider returned one) the video is stored locally
    Succeeded,
    /// Finished with an error recorded on the task
    Failed,
}

impl TaskStatus {
    /// Whether this status ends the task's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` follows the lifecycle graph
    ///
    /// Staying in the same non-terminal status is allowed; leaving a terminal one is not.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, _) => true,
            (TaskStatus::Running, TaskStatus::Pending) => false,
            (TaskStatus::Running, _) => true,
            (TaskStatus::Succeeded | TaskStatus::Failed, _) => false,
        }
    }

    /// Wire name, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error codes recorded on failed tasks.
///
/// Provider-reported failures keep the provider's own code instead.
pub mod error_codes {
    /// No provider credential is configured
    pub const CONFIGURATION_ERROR: &str = "ConfigurationError";
    /// The provider reported success but the result could not be stored locally
    pub const ASSET_RETRIEVAL_FAILED: &str = "AssetRetrievalFailed";
    /// The provider no longer knows the job
    pub const REMOTE_JOB_NOT_FOUND: &str = "RemoteJobNotFound";
    /// An unexpected local error ended the poller
    pub const INTERNAL_ERROR: &str = "InternalError";
    /// Provider failure without a code
    pub const UNKNOWN_ERROR: &str = "UnknownError";
}

/// Generation parameters recorded on a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationParams {
    /// Prompt text
    pub prompt: String,
    /// Negative prompt (None when empty)
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Provider model identifier
    pub model: String,
    /// Output resolution, e.g. "720P"
    pub resolution: String,
    /// Let the provider rewrite the prompt
    #[serde(default)]
    pub prompt_extend: bool,
}

/// Default prompt when the caller leaves it empty
pub const DEFAULT_PROMPT: &str =
    "Turn the still image into a dynamic video with natural motion effects";

/// Default model
pub const DEFAULT_MODEL: &str = "wanx2.1-i2v-turbo";

/// Default resolution
pub const DEFAULT_RESOLUTION: &str = "720P";

/// Resolutions each known model accepts. Models not listed are passed through unchecked.
pub const MODEL_RESOLUTIONS: &[(&str, &[&str])] = &[
    ("wan2.2-i2v-plus", &["480P", "1080P"]),
    ("wan2.2-i2v-flash", &["480P", "720P"]),
    ("wanx2.1-i2v-plus", &["720P"]),
    ("wanx2.1-i2v-turbo", &["480P", "720P"]),
];

/// Look up the supported resolutions for a model
pub fn supported_resolutions(model: &str) -> Option<&'static [&'static str]> {
    MODEL_RESOLUTIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, resolutions)| *resolutions)
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            negative_prompt: None,
            model: DEFAULT_MODEL.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            prompt_extend: false,
        }
    }
}

/// A request to start a generation from an already stored image
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    /// Generation parameters
    pub params: GenerationParams,
    /// Path of the stored source image
    pub image_path: PathBuf,
}

/// The unit of work tracked by the engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskRecord {
    /// Local task id
    pub id: TaskId,
    /// Provider job id, required for polling
    #[serde(default)]
    pub remote_job_id: Option<String>,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Parameters the task was submitted with
    #[serde(flatten)]
    pub params: GenerationParams,
    /// Creation time
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    /// Set exactly when the status becomes terminal
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Stored source image
    #[schema(value_type = String)]
    pub input_asset_path: PathBuf,
    /// Remote location of the generated video
    #[serde(default)]
    pub result_asset_url: Option<String>,
    /// Local copy of the generated video
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub output_asset_path: Option<PathBuf>,
    /// Last status message reported by the provider.
    ///
    /// Updating it alone does not write the snapshot; it reaches disk with the next
    /// status change or the shutdown flush, so a crash can lose it.
    #[serde(default)]
    pub message: Option<String>,
    /// Human-readable failure description
    #[serde(default)]
    pub error_message: Option<String>,
    /// Machine-readable failure code
    #[serde(default)]
    pub error_code: Option<String>,
}

impl TaskRecord {
    /// New `PENDING` record for a job the provider has accepted
    pub fn new(
        params: GenerationParams,
        input_asset_path: PathBuf,
        remote_job_id: Option<String>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            remote_job_id,
            status: TaskStatus::Pending,
            params,
            created_at: Utc::now(),
            completed_at: None,
            input_asset_path,
            result_asset_url: None,
            output_asset_path: None,
            message: None,
            error_message: None,
            error_code: None,
        }
    }

    /// Move a pending task to `RUNNING`. Returns whether the status changed.
    pub fn mark_running(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        true
    }

    /// Finish successfully. Returns false (and changes nothing) if already terminal.
    pub fn mark_succeeded(
        &mut self,
        result_asset_url: Option<String>,
        output_asset_path: Option<PathBuf>,
    ) -> bool {
        if !self.status.can_transition_to(TaskStatus::Succeeded) {
            return false;
        }
        self.status = TaskStatus::Succeeded;
        self.result_asset_url = result_asset_url;
        self.output_asset_path = output_asset_path;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Finish with an error. Returns false (and changes nothing) if already terminal.
    pub fn mark_failed(&mut self, code: impl Into<String>, message: impl Into<String>) -> bool {
        if !self.status.can_transition_to(TaskStatus::Failed) {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
        true
    }

    /// Whether a poller should be running for this record
    pub fn needs_polling(&self) -> bool {
        !self.status.is_terminal() && self.remote_job_id.is_some()
    }
}

/// Kind of live notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// First event on every subscription
    Connected,
    /// Some task changed; clients re-read the task list
    TasksUpdated,
    /// Keep-alive, independent of task activity
    Heartbeat,
}

impl NotificationKind {
    /// SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Connected => "connected",
            NotificationKind::TasksUpdated => "tasks_updated",
            NotificationKind::Heartbeat => "heartbeat",
        }
    }
}

/// Lightweight change notification pushed to listeners
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// What happened
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
}

impl Notification {
    /// Stamp a notification with the current time
    pub fn now(kind: NotificationKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp(),
        }
    }
}
