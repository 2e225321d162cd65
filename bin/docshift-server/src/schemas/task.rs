use chrono::{DateTime, Utc};
use docshift_core::Task;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Snapshot returned by `GET /progress/{task_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub progress: u8,
    /// `processing`, `done` or `error`.
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for ProgressResponse {
    fn from(task: &Task) -> Self {
        Self {
            progress: task.progress,
            status: task.status.as_str().to_owned(),
            message: task.message.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub tool: String,
    pub status: String,
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            tool: task.tool.clone(),
            status: task.status.as_str().to_owned(),
            progress: task.progress,
            message: task.message.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}
