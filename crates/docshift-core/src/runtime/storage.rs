use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::runtime::types::{RuntimeError, Task, TaskId};

/// Centralized, thread-safe record storage for all live tasks.
///
/// A single `std::sync::Mutex` guards the map: progress sinks call in from
/// blocking worker threads, and every operation holds the lock only for one
/// read or one read-modify-write. The map itself is never handed out.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<TaskId, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a task half-written (every
    // mutation is a plain field store), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Task>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new task record. Ids are never reused.
    pub fn create(&self, task: Task) -> Result<(), RuntimeError> {
        let mut guard = self.lock();
        if guard.contains_key(&task.id) {
            return Err(RuntimeError::DuplicateTask { task_id: task.id });
        }
        guard.insert(task.id, task);
        Ok(())
    }

    /// Apply `mutator` to the task under the lock.
    ///
    /// Returns `false` (and does nothing) when the id is unknown, which is
    /// the normal outcome for a worker racing with cleanup.
    pub fn update<F>(&self, task_id: &TaskId, mutator: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        match self.lock().get_mut(task_id) {
            Some(task) => {
                mutator(task);
                task.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Return a copy of the task record.
    pub fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.lock().get(task_id).cloned()
    }

    /// Remove the task record; a missing id is a no-op.
    pub fn remove(&self, task_id: &TaskId) -> Option<Task> {
        self.lock().remove(task_id)
    }

    /// Copies of every live task, oldest first.
    pub fn snapshots(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.lock().values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Terminal tasks whose last update is older than `ttl` at `now`.
    pub fn expired(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<Task> {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Vec::new();
        };
        self.lock()
            .values()
            .filter(|t| t.status.is_terminal() && now - t.updated_at >= ttl)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
