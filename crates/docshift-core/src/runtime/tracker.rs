use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::{AbortHandle, JoinHandle};

use crate::runtime::types::TaskId;

/// Tracks abort handles of in-flight worker futures, keyed by task id.
///
/// Entries are removed by the worker itself when it finishes, so the map
/// only ever holds jobs that are still running.
#[derive(Clone, Default)]
pub struct JobTracker {
    handles: Arc<Mutex<HashMap<TaskId, AbortHandle>>>,
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JobTracker({} handles)", self.lock().len())
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, AbortHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `fut` on the runtime and track it until it completes.
    ///
    /// The handle is inserted while the lock is held, and the spawned future
    /// needs that same lock to remove itself, so removal can never run
    /// before insertion.
    pub fn spawn<F>(&self, task_id: TaskId, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.lock();
        let handles = Arc::clone(&self.handles);
        let join = tokio::spawn(async move {
            fut.await;
            handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&task_id);
        });
        guard.insert(task_id, join.abort_handle());
        join
    }

    /// Number of jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }
}
