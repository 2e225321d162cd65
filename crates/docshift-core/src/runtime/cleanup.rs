//! Deferred, idempotent retirement of finished tasks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::runtime::storage::TaskRegistry;
use crate::runtime::types::TaskId;
use crate::runtime::workspace::WorkspaceManager;

/// Retire `task_id` after `delay` on a background task.
///
/// The delay has to outlast any in-flight read of the artifact; callers read
/// the result into memory before scheduling.
pub fn schedule_cleanup(
    registry: TaskRegistry,
    workspaces: WorkspaceManager,
    task_id: TaskId,
    workspace: PathBuf,
    delay: Duration,
) -> JoinHandle<()> {
    debug!(task_id = %task_id, delay_secs = delay.as_secs_f64(), "cleanup scheduled");
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        retire(&registry, &workspaces, &task_id, &workspace).await;
    })
}

/// Destroy the workspace, then drop the registry entry.
///
/// Running this twice for the same task is harmless: the second pass finds
/// neither the directory nor the entry.
pub async fn retire(
    registry: &TaskRegistry,
    workspaces: &WorkspaceManager,
    task_id: &TaskId,
    workspace: &Path,
) {
    if let Err(e) = workspaces.destroy(workspace).await {
        warn!(task_id = %task_id, error = %e, "failed to remove workspace");
    }
    if registry.remove(task_id).is_some() {
        info!(task_id = %task_id, "task retired");
    }
}

/// Retire every terminal task whose last update is older than `ttl`.
///
/// Returns how many tasks were retired. Processing tasks are never touched.
pub async fn sweep_expired(
    registry: &TaskRegistry,
    workspaces: &WorkspaceManager,
    ttl: Duration,
) -> usize {
    let expired = registry.expired(ttl, Utc::now());
    for task in &expired {
        debug!(task_id = %task.id, status = task.status.as_str(), "task expired");
        retire(registry, workspaces, &task.id, &task.workspace).await;
    }
    expired.len()
}
