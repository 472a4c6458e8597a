//! Validation and submission of new tasks.

use super::TaskEngine;
use crate::error::{Result, ValidationError};
use crate::provider::SubmitJob;
use crate::types::{
    DEFAULT_PROMPT, GenerationParams, SubmitRequest, TaskId, TaskRecord, supported_resolutions,
};

impl TaskEngine {
    /// Submit a generation job and start tracking it.
    ///
    /// Nothing is stored unless the provider accepts the job: validation errors and
    /// provider rejections are returned to the caller and leave no task behind.
    pub async fn submit(&self, request: SubmitRequest) -> Result<TaskId> {
        let params = normalize(request.params);
        validate_params(&params)?;
        self.storage.validate_image(&request.image_path).await?;

        let image_data_url = self.storage.image_data_url(&request.image_path).await?;
        let job = SubmitJob {
            params: params.clone(),
            image_data_url,
        };
        let remote_job_id = self.provider.submit(&job).await?;

        let record = TaskRecord::new(params, request.image_path, Some(remote_job_id.clone()));
        let id = self.store.create(record).await?;
        tracing::info!(task_id = %id, %remote_job_id, model = %job.params.model, "Task submitted");

        self.commit(id).await;
        self.spawn_poller(id).await;
        Ok(id)
    }
}

/// Fill defaults for blank fields
fn normalize(mut params: GenerationParams) -> GenerationParams {
    if params.prompt.trim().is_empty() {
        params.prompt = DEFAULT_PROMPT.to_string();
    }
    params.negative_prompt = params
        .negative_prompt
        .filter(|negative| !negative.trim().is_empty());
    params
}

/// Reject a resolution the chosen model does not support. Unknown models pass.
pub(crate) fn validate_params(params: &GenerationParams) -> std::result::Result<(), ValidationError> {
    match supported_resolutions(&params.model) {
        Some(supported) if !supported.contains(&params.resolution.as_str()) => {
            Err(ValidationError::UnsupportedResolution {
                model: params.model.clone(),
                resolution: params.resolution.clone(),
                supported: supported.join(", "),
            })
        }
        _ => Ok(()),
    }
}
