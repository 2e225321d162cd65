use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::services::OperationError;

/// Unique identifier for a submitted conversion task.
pub type TaskId = Uuid;

/// Message a freshly registered task carries until its worker starts.
pub const WAITING_MESSAGE: &str = "Waiting to start...";

/// Lifecycle state of a task.
///
/// The result artifact lives inside [`TaskStatus::Done`], so a task can only
/// expose a result path once it has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The worker is (or is about to start) running the conversion.
    Processing,
    /// Conversion finished; `result_path` points at the single artifact.
    Done { result_path: PathBuf },
    /// Conversion failed; the description is in the task message.
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Done { .. } => "done",
            TaskStatus::Error => "error",
        }
    }

    /// Returns `true` once the task can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done { .. } | TaskStatus::Error)
    }
}

/// The complete in-memory record for a single submitted task.
///
/// Callers outside the registry only ever hold copies of this record.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    /// Tool name exactly as submitted (it may not name a supported tool).
    pub tool: String,
    pub status: TaskStatus,
    /// Percentage in `0..=100`.
    pub progress: u8,
    pub message: String,
    /// Directory exclusively owned by this task.
    pub workspace: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A new task in `processing` state with zero progress.
    pub fn new(id: TaskId, tool: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id,
            tool: tool.into(),
            status: TaskStatus::Processing,
            progress: 0,
            message: WAITING_MESSAGE.to_owned(),
            workspace: workspace.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn result_path(&self) -> Option<&Path> {
        match &self.status {
            TaskStatus::Done { result_path } => Some(result_path),
            _ => None,
        }
    }

    /// Record an intermediate progress report. Ignored once terminal.
    pub fn report(&mut self, progress: u8, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.progress = progress.min(100);
        self.message = message.into();
        true
    }

    /// Transition to `done`. Ignored once terminal.
    pub fn complete(&mut self, result_path: PathBuf, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Done { result_path };
        self.progress = 100;
        self.message = message.into();
        true
    }

    /// Transition to `error` with progress reset to zero. Ignored once terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Error;
        self.progress = 0;
        self.message = message.into();
        true
    }
}

/// Errors produced by the registry and workspace layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A task with this id is already registered.
    #[error("task already registered: {task_id}")]
    DuplicateTask { task_id: TaskId },

    /// A workspace directory could not be created, written or removed.
    #[error("workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuntimeError::Workspace {
            path: path.into(),
            source,
        }
    }
}

/// Failures between resolving a tool and producing the final artifact.
///
/// Every variant ends up as the message of a task in `error` state.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested tool name is not in the operation table.
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    /// The conversion operation itself failed.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// The operation reported success without producing any file.
    #[error("the conversion produced no output files")]
    NoOutput,

    /// Multiple outputs could not be bundled into one archive.
    #[error("failed to bundle outputs: {0}")]
    Bundle(#[from] zip::result::ZipError),

    /// The blocking worker thread panicked or was aborted.
    #[error("conversion worker stopped unexpectedly")]
    WorkerPanicked,
}

/// Reasons a result cannot be handed out.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Unknown id, or the task was already cleaned up.
    #[error("task not found: {task_id}")]
    NotFound { task_id: TaskId },

    /// The task is still processing or has failed.
    #[error("task {task_id} is not ready yet")]
    NotReady { task_id: TaskId },

    /// The registry says `done` but the artifact is gone from disk.
    #[error("result artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// The artifact exists but could not be read.
    #[error("failed to read result artifact {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A result artifact read fully into memory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: bytes::Bytes,
}

/// One uploaded file, held in memory until it is persisted into a workspace.
#[derive(Debug, Clone)]
pub struct Upload {
    /// File name as sent by the client (unsanitized).
    pub file_name: String,
    pub bytes: bytes::Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<bytes::Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}
