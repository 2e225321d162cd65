use crate::runtime::storage::TaskRegistry;
use crate::runtime::types::TaskId;

/// Highest value an operation may report; 100 is reserved for `done`.
pub const MAX_REPORTED_PROGRESS: u8 = 99;

/// Callback handed to a conversion operation for progress reports.
///
/// Each report is one locked read-modify-write on the registry. Reports for
/// a task that has been removed or has reached a terminal state are dropped.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    registry: TaskRegistry,
    task_id: TaskId,
}

impl ProgressSink {
    pub fn new(registry: TaskRegistry, task_id: TaskId) -> Self {
        Self { registry, task_id }
    }

    /// A sink attached to an empty private registry; every report is dropped.
    pub fn detached() -> Self {
        Self::new(TaskRegistry::new(), TaskId::nil())
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Report `percent` (clamped below 100) and a status message.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let percent = percent.min(MAX_REPORTED_PROGRESS);
        let message = message.into();
        self.registry.update(&self.task_id, |task| {
            task.report(percent, message);
        });
    }

    /// Report item `index` of `total`, mapped linearly into
    /// `base..base + span`.
    pub fn step(&self, base: u8, span: u8, index: usize, total: usize, message: impl Into<String>) {
        let total = total.max(1);
        let offset = (index.min(total) * span as usize / total) as u8;
        self.report(base.saturating_add(offset), message);
    }
}
