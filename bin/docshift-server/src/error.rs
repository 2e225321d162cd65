//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! Internal errors are logged with full detail but only a generic message is
//! returned, so workspace paths never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docshift_core::{FetchError, RuntimeError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the docshift-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Registry or workspace failure while accepting a task.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The caller referenced a task that does not exist (any more).
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The task exists but has no result to hand out.
    #[error("not ready: {0}")]
    NotReady(String),

    /// The request body exceeded the configured upload limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The task is `done` but its artifact is gone from disk.
    #[error("result missing: {0}")]
    ResultMissing(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::NotReady(m) => (StatusCode::ACCEPTED, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),

            ServerError::Runtime(e) => {
                error!(error = %e, "task runtime error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to store uploaded files".to_owned(),
                )
            }
            ServerError::ResultMissing(m) => {
                error!(detail = %m, "result artifact missing");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Result file not found".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<FetchError> for ServerError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound { .. } => ServerError::NotFound("Task not found".into()),
            FetchError::NotReady { .. } => ServerError::NotReady("File not ready".into()),
            FetchError::ArtifactMissing { .. } => ServerError::ResultMissing(e.to_string()),
            FetchError::Read { .. } => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full chain before it is flattened into a generic message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::to_bytes;
    use std::path::PathBuf;
    use uuid::Uuid;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn fetch_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        let cases = [
            (FetchError::NotFound { task_id: id }, StatusCode::NOT_FOUND),
            (FetchError::NotReady { task_id: id }, StatusCode::ACCEPTED),
            (
                FetchError::ArtifactMissing { path: PathBuf::from("/w/merged.pdf") },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = ServerError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let err = ServerError::from(anyhow::anyhow!("disk full at /srv/secret"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await["error"], "internal server error");

        let err = ServerError::Runtime(RuntimeError::DuplicateTask { task_id: Uuid::new_v4() });
        let body = body_of(err.into_response()).await;
        assert!(!body["error"].as_str().unwrap().contains("task"));
    }
}
