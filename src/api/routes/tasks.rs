//! Task submission and retrieval handlers.

use super::{GenerateResponse, TaskListResponse, TaskResponse};
use crate::api::AppState;
use crate::engine::{AssetKind, validate_params};
use crate::error::{Error, Result, ValidationError};
use crate::types::{GenerationParams, SubmitRequest, TaskId};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::path::Path as FsPath;
use tokio_util::io::ReaderStream;

/// POST /generate - Upload an image and start a generation
#[utoipa::path(
    post,
    path = "/generate",
    tag = "tasks",
    request_body(content = super::GenerateForm, description = "Image and generation parameters", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Task created", body = GenerateResponse),
        (status = 400, description = "Invalid parameters or image", body = crate::error::ApiError),
        (status = 503, description = "No provider credential configured", body = crate::error::ApiError),
        (status = 502, description = "Provider rejected the job", body = crate::error::ApiError)
    )
)]
pub async fn generate(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let mut params = GenerationParams {
        prompt: String::new(),
        ..GenerationParams::default()
    };
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::InvalidForm(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "image" {
            let file_name = field.file_name().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ValidationError::InvalidForm(e.to_string()))?;
            image = Some((file_name, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ValidationError::InvalidForm(e.to_string()))?;
        match name.as_str() {
            "prompt" => params.prompt = value,
            "negative_prompt" => params.negative_prompt = Some(value),
            "model" if !value.trim().is_empty() => params.model = value,
            "resolution" if !value.trim().is_empty() => params.resolution = value,
            "prompt_extend" => params.prompt_extend = is_checked(&value),
            _ => {}
        }
    }

    // Parameters are checked before the image so a bad combination never stores a file
    validate_params(&params)?;

    let (file_name, data) = match image {
        Some((file_name, data)) if !file_name.is_empty() && !data.is_empty() => (file_name, data),
        _ => return Err(ValidationError::MissingImage.into()),
    };

    let image_path = state.engine.storage().save_upload(&file_name, &data).await?;

    let request = SubmitRequest {
        params,
        image_path: image_path.clone(),
    };
    match state.engine.submit(request).await {
        Ok(task_id) => Ok(Json(GenerateResponse {
            success: true,
            task_id,
        })
        .into_response()),
        Err(e) => {
            // No task references the upload, so it would be orphaned
            if let Err(remove_err) = tokio::fs::remove_file(&image_path).await {
                tracing::warn!(path = %image_path.display(), error = %remove_err, "Failed to remove rejected upload");
            }
            Err(e)
        }
    }
}

/// GET /status/:id - Get one task
#[utoipa::path(
    get,
    path = "/status/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task state", body = TaskResponse),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>> {
    let task = state.engine.get_task(parse_task_id(&id)?).await?;
    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}

/// GET /tasks - List all tasks
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "All tasks, newest first", body = TaskListResponse)
    )
)]
pub async fn list_tasks(State(state): State<AppState>) -> Json<TaskListResponse> {
    Json(TaskListResponse {
        success: true,
        tasks: state.engine.list_tasks().await,
    })
}

/// GET /download/:id - Download the generated video
#[utoipa::path(
    get,
    path = "/download/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "The video file", body = Vec<u8>, content_type = "video/mp4"),
        (status = 404, description = "Task or video not found", body = crate::error::ApiError),
        (status = 409, description = "Task has not succeeded", body = crate::error::ApiError),
        (status = 502, description = "Video could not be retrieved again", body = crate::error::ApiError)
    )
)]
pub async fn download_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_task_id(&id)?;
    let path = state.engine.fetch_result_asset(id).await?;
    let disposition = format!("attachment; filename=\"{id}.mp4\"");
    serve_file(&path, "video/mp4", Some(disposition)).await
}

/// GET /preview/:id/:file_type - Preview the input image or output video
#[utoipa::path(
    get,
    path = "/preview/{id}/{file_type}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID"),
        ("file_type" = String, Path, description = "\"input\" or \"output\"")
    ),
    responses(
        (status = 200, description = "The file, served inline"),
        (status = 404, description = "Task or file not found", body = crate::error::ApiError)
    )
)]
pub async fn preview_file(
    State(state): State<AppState>,
    Path((id, file_type)): Path<(String, String)>,
) -> Result<Response> {
    let id = parse_task_id(&id)?;
    let kind: AssetKind = file_type.parse().map_err(|_| Error::AssetMissing {
        id,
        what: file_type.clone(),
    })?;
    let path = state.engine.asset_path(id, kind).await?;
    serve_file(&path, content_type_for(&path), None).await
}

/// Ids that are not UUIDs cannot name a task
fn parse_task_id(raw: &str) -> Result<TaskId> {
    raw.parse().map_err(|_| Error::InvalidTaskId(raw.to_string()))
}

fn is_checked(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1")
}

fn content_type_for(path: &FsPath) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Stream a file from disk without buffering it
async fn serve_file(
    path: &FsPath,
    content_type: &'static str,
    disposition: Option<String>,
) -> Result<Response> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        body,
    )
        .into_response();

    if let Some(disposition) = disposition
        && let Ok(value) = disposition.parse()
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
