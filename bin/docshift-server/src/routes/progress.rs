use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::parse_task_id;
use crate::schemas::ErrorResponse;
use crate::schemas::task::ProgressResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_progress), components(schemas(ProgressResponse, ErrorResponse)))]
pub struct ProgressApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/progress/{task_id}", get(get_progress))
}

/// Current state of a task.
#[utoipa::path(
    get,
    path = "/progress/{task_id}",
    tag = "convert",
    params(("task_id" = String, Path, description = "Id returned by POST /convert")),
    responses(
        (status = 200, description = "Task snapshot", body = ProgressResponse),
        (status = 404, description = "Unknown or retired task", body = ErrorResponse),
    )
)]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ProgressResponse>, ServerError> {
    let task_id = parse_task_id(&task_id)?;
    let task = state
        .jobs
        .progress(&task_id)
        .ok_or_else(|| ServerError::NotFound("Task not found".into()))?;
    Ok(Json(ProgressResponse::from(&task)))
}
