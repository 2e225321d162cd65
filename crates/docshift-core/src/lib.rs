pub mod runtime;
pub mod services;

pub use runtime::dispatcher::Dispatcher;
pub use runtime::orchestrator::JobRuntime;
pub use runtime::progress::ProgressSink;
pub use runtime::storage::TaskRegistry;
pub use runtime::types::{
    Artifact, DispatchError, FetchError, RuntimeError, Task, TaskId, TaskStatus, Upload,
};
pub use runtime::workspace::{WorkspaceManager, file_extension, sanitize_filename};
pub use services::{
    CompressLevel, ConversionJob, ConversionOperation, ConversionOptions, OperationError, Programs,
    Tool,
};
