//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, body limit)
//! - Optional OpenAPI document (disable with `DOCSHIFT_ENABLE_OPENAPI=false`)
//! - Health and tool listing routes
//! - The conversion routes: `/convert`, `/progress/{id}`, `/download/{id}`

mod convert;
pub mod doc;
mod download;
mod health;
mod progress;
mod tasks;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use tower::ServiceBuilder;
use uuid::Uuid;

use crate::error::ServerError;
use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(convert::router())
        .merge(progress::router())
        .merge(download::router())
        .merge(tasks::router());

    if state.config.enable_openapi {
        app = app.route("/api-docs/openapi.json", get(doc::openapi_json));
    }

    app
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

/// Parse a task id from the path. Malformed ids are reported as unknown.
pub(crate) fn parse_task_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::NotFound("Task not found".into()))
}

#[cfg(test)]
mod tests;
