use std::io::ErrorKind;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::runtime::cleanup::{schedule_cleanup, sweep_expired};
use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::storage::TaskRegistry;
use crate::runtime::tracker::JobTracker;
use crate::runtime::types::{Artifact, FetchError, RuntimeError, Task, TaskId, Upload};
use crate::runtime::worker::run_job;
use crate::runtime::workspace::WorkspaceManager;
use crate::services::{ConversionJob, ConversionOptions, Tool};

/// Default delay between handing out a result and retiring its task.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(10);

/// The job orchestration layer.
///
/// Ties the registry, workspaces, dispatcher and worker tracker together
/// behind the three client-facing operations: submit, observe, download.
/// Cloning is cheap; every clone shares the same registry.
///
/// # Usage
///
/// ```rust,ignore
/// let jobs = JobRuntime::new(Dispatcher::with_programs(&Programs::default()));
/// let task_id = jobs.submit("merge-pdf", uploads, ConversionOptions::default()).await?;
/// let task = jobs.progress(&task_id);
/// ```
#[derive(Debug, Clone)]
pub struct JobRuntime {
    registry: TaskRegistry,
    workspaces: WorkspaceManager,
    dispatcher: Dispatcher,
    tracker: JobTracker,
    cleanup_delay: Duration,
}

impl JobRuntime {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            registry: TaskRegistry::new(),
            workspaces: WorkspaceManager::default(),
            dispatcher,
            tracker: JobTracker::new(),
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
        }
    }

    pub fn with_workspaces(mut self, workspaces: WorkspaceManager) -> Self {
        self.workspaces = workspaces;
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Tools the dispatcher can run, in declaration order.
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools = self.dispatcher.tools();
        tools.sort();
        tools
    }

    /// Register a new task and launch its worker; returns without waiting.
    ///
    /// The tool name is not validated here. An unsupported tool becomes a
    /// task in `error` state once the worker resolves it.
    pub async fn submit(
        &self,
        tool: &str,
        uploads: Vec<Upload>,
        options: ConversionOptions,
    ) -> Result<TaskId, RuntimeError> {
        let task_id = Uuid::new_v4();
        let workspace = self.workspaces.allocate().await?;

        let mut inputs = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            match self
                .workspaces
                .persist(&workspace, &upload.file_name, &upload.bytes)
                .await
            {
                Ok(path) => inputs.push(path),
                Err(e) => {
                    self.discard_workspace(&task_id, &workspace).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = self
            .registry
            .create(Task::new(task_id, tool, workspace.clone()))
        {
            self.discard_workspace(&task_id, &workspace).await;
            return Err(e);
        }

        info!(task_id = %task_id, tool = %tool, files = inputs.len(), "task submitted");

        let job = ConversionJob {
            inputs,
            workspace,
            options,
        };
        self.tracker.spawn(
            task_id,
            run_job(
                self.registry.clone(),
                self.dispatcher.clone(),
                task_id,
                tool.to_owned(),
                job,
            ),
        );
        Ok(task_id)
    }

    async fn discard_workspace(&self, task_id: &TaskId, workspace: &std::path::Path) {
        if let Err(e) = self.workspaces.destroy(workspace).await {
            warn!(task_id = %task_id, error = %e, "failed to discard workspace of rejected task");
        }
    }

    /// A copy of the task record, or `None` for an unknown id.
    pub fn progress(&self, task_id: &TaskId) -> Option<Task> {
        self.registry.get(task_id)
    }

    /// Read the result of a `done` task into memory and schedule its cleanup.
    ///
    /// A task in `error` state reports [`FetchError::NotReady`], the same as
    /// one still processing.
    pub async fn download(&self, task_id: &TaskId) -> Result<Artifact, FetchError> {
        let task = self
            .registry
            .get(task_id)
            .ok_or(FetchError::NotFound { task_id: *task_id })?;
        let path = task
            .result_path()
            .ok_or(FetchError::NotReady { task_id: *task_id })?
            .to_path_buf();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FetchError::ArtifactMissing { path });
            }
            Err(source) => return Err(FetchError::Read { path, source }),
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_owned());

        schedule_cleanup(
            self.registry.clone(),
            self.workspaces.clone(),
            *task_id,
            task.workspace,
            self.cleanup_delay,
        );

        info!(task_id = %task_id, file = %file_name, size = bytes.len(), "result delivered");
        Ok(Artifact {
            file_name,
            bytes: bytes.into(),
        })
    }

    /// Retire terminal tasks untouched for longer than `ttl`.
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        sweep_expired(&self.registry, &self.workspaces, ttl).await
    }
}
