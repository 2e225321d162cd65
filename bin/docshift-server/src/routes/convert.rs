//! Conversion submission (`POST /convert`).
//!
//! Uploads are validated and persisted into a fresh workspace, the task is
//! registered as `processing`, and a background worker is launched. The
//! response carries only the task id; clients poll `/progress/{id}`.

use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use docshift_core::{CompressLevel, ConversionOptions, Upload, file_extension};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ErrorResponse;
use crate::schemas::convert::{ConvertForm, ConvertResponse};
use crate::state::AppState;

/// Extensions accepted for upload, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["pdf", "docx", "txt", "xlsx", "jpg", "jpeg", "png"];

#[derive(OpenApi)]
#[openapi(paths(convert), components(schemas(ConvertForm, ConvertResponse, ErrorResponse)))]
pub struct ConvertApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/convert", post(convert))
}

/// The multipart fields of one submission.
#[derive(Debug, Default)]
struct Submission {
    files: Vec<Upload>,
    tool: Option<String>,
    compress_level: Option<String>,
}

/// Submit a conversion task.
///
/// The tool name is not checked here: an unknown tool yields a task that
/// fails with `unsupported tool: <name>`.
#[utoipa::path(
    post,
    path = "/convert",
    tag = "convert",
    request_body(content = ConvertForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Task accepted", body = ConvertResponse),
        (status = 400, description = "Invalid upload", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 500, description = "Uploads could not be stored", body = ErrorResponse),
    )
)]
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ServerError> {
    let multipart = multipart.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let submission = read_submission(multipart).await?;
    validate_files(&submission.files)?;

    let tool = submission.tool.unwrap_or_default();
    let options = ConversionOptions {
        compress_level: CompressLevel::parse_or_default(submission.compress_level.as_deref()),
    };
    debug!(tool = %tool, files = submission.files.len(), level = %options.compress_level, "conversion request");

    let task_id = state.jobs.submit(&tool, submission.files, options).await?;
    Ok(Json(ConvertResponse { task_id }))
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, ServerError> {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                submission.files.push(Upload::new(file_name, bytes));
            }
            "tool" => submission.tool = Some(field.text().await.map_err(multipart_error)?),
            "compress_level" => {
                submission.compress_level = Some(field.text().await.map_err(multipart_error)?)
            }
            other => {
                return Err(ServerError::BadRequest(format!("unexpected field: {other}")));
            }
        }
    }
    Ok(submission)
}

fn validate_files(files: &[Upload]) -> Result<(), ServerError> {
    match files.first() {
        None => return Err(ServerError::BadRequest("No file uploaded".into())),
        Some(first) if first.file_name.is_empty() => {
            return Err(ServerError::BadRequest("No file selected".into()));
        }
        Some(_) => {}
    }

    for file in files {
        if !is_allowed(&file.file_name) {
            return Err(ServerError::BadRequest(format!(
                "Extension not allowed: {}",
                file.file_name
            )));
        }
    }
    Ok(())
}

fn is_allowed(file_name: &str) -> bool {
    file_extension(file_name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::BadRequest(e.body_text())
    }
}
