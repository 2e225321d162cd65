//! Read-only listings: live tasks and supported tools.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::convert::ToolsResponse;
use crate::schemas::task::TaskResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_tasks, list_tools), components(schemas(TaskResponse, ToolsResponse)))]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tools", get(list_tools))
}

/// Every task still held in the registry, oldest first.
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    responses((status = 200, description = "Live tasks", body = Vec<TaskResponse>))
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskResponse>> {
    let tasks = state.jobs.registry().snapshots();
    Json(tasks.iter().map(TaskResponse::from).collect())
}

/// Tool keys accepted by `POST /convert`.
#[utoipa::path(
    get,
    path = "/tools",
    tag = "tasks",
    responses((status = 200, description = "Supported tools", body = ToolsResponse))
)]
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.jobs.tools().iter().map(ToString::to_string).collect(),
    })
}
