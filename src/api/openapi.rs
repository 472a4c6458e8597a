//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa and served from
//! `/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the i2v-engine REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "i2v-engine REST API",
        version = "0.1.0",
        description = "Submit image-to-video generation jobs, track them and download the results"
    ),
    paths(
        // Tasks
        crate::api::routes::generate,
        crate::api::routes::get_status,
        crate::api::routes::list_tasks,
        crate::api::routes::download_video,
        crate::api::routes::preview_file,

        // System
        crate::api::routes::event_stream,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::types::TaskId,
            crate::types::TaskStatus,
            crate::types::TaskRecord,
            crate::types::GenerationParams,
            crate::types::Notification,
            crate::types::NotificationKind,
            crate::error::ApiError,
            crate::error::ErrorDetail,
            crate::api::routes::GenerateForm,
            crate::api::routes::GenerateResponse,
            crate::api::routes::TaskResponse,
            crate::api::routes::TaskListResponse,
            crate::api::routes::HealthResponse,
        )
    ),
    tags(
        (name = "tasks", description = "Generation task submission and tracking"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;
