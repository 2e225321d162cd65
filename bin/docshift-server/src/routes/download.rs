use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use docshift_core::file_extension;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::parse_task_id;
use crate::schemas::ErrorResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(download), components(schemas(ErrorResponse)))]
pub struct DownloadApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download/{task_id}", get(download))
}

/// Fetch the result of a finished task.
///
/// The artifact is read into memory before the response is built, and the
/// task is retired a few seconds later. A failed task answers 202 like one
/// still running; its message is only available from `/progress`.
#[utoipa::path(
    get,
    path = "/download/{task_id}",
    tag = "convert",
    params(("task_id" = String, Path, description = "Id returned by POST /convert")),
    responses(
        (status = 200, description = "Result file", content_type = "application/octet-stream", body = Vec<u8>),
        (status = 202, description = "Task still processing or failed", body = ErrorResponse),
        (status = 404, description = "Unknown or retired task", body = ErrorResponse),
        (status = 500, description = "Result file missing", body = ErrorResponse),
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Response, ServerError> {
    let task_id = parse_task_id(&task_id)?;
    let artifact = state.jobs.download(&task_id).await?;

    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, content_type(&artifact.file_name).to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(artifact.bytes),
    )
        .into_response())
}

fn content_type(file_name: &str) -> &'static str {
    match file_extension(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}
