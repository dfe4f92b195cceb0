//! In-memory task registry.
//!
//! Every submission becomes a [`Task`] that lives here for the lifetime of
//! the process. The registry is the single source of truth for task state;
//! workers and API handlers both read and write through it. State history is
//! not kept, so a restart forgets everything.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a task. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// One submitted conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub source_key: String,
    pub state: TaskState,
    /// 0 while running or about to start; 1..n while waiting, ordered by
    /// submission time. Recomputed on every slot change.
    pub queue_position: usize,
    pub message: String,
    /// Object key of the master manifest once the task completes.
    pub result_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe map of all known tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a new queued task for `source_key`.
    pub fn insert(&self, source_key: &str) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            source_key: source_key.to_string(),
            state: TaskState::Queued,
            queue_position: 0,
            message: "Waiting in queue".to_string(),
            result_key: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().insert(task.id, task.clone());
        task
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().get(&id).cloned()
    }

    /// Most recent task (by creation time) for a source key, if any.
    pub fn get_by_source_key(&self, source_key: &str) -> Option<Task> {
        self.tasks
            .read()
            .values()
            .filter(|t| t.source_key == source_key)
            .max_by_key(|t| t.created_at)
            .cloned()
    }

    /// Snapshot of all tasks, newest first.
    pub fn snapshot(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Number of tasks currently waiting in the queue.
    pub fn queued_count(&self) -> usize {
        self.tasks
            .read()
            .values()
            .filter(|t| t.state == TaskState::Queued)
            .count()
    }

    /// Apply `f` to the task with the given id.
    ///
    /// Terminal tasks are immutable: an update against a completed or failed
    /// task is dropped with a warning, as is an update for an unknown id.
    pub fn update<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(&id) {
            Some(task) if task.state.is_terminal() => {
                tracing::warn!(%id, state = ?task.state, "ignoring update to terminal task");
            }
            Some(task) => {
                f(task);
                task.updated_at = Utc::now();
            }
            None => {
                tracing::warn!(%id, "ignoring update to unknown task");
            }
        }
    }

    /// Reassign queue positions after a slot change.
    ///
    /// Queued tasks are ordered by submission time; the first `slots_free`
    /// are about to start and get position 0, the rest get 1..n. Tasks in any
    /// other state are pinned to 0. The whole sweep happens under one write
    /// lock so readers never observe a half-updated ordering.
    pub fn recompute_positions(&self, slots_free: usize) {
        let mut tasks = self.tasks.write();

        let mut queued: Vec<(Uuid, DateTime<Utc>)> = tasks
            .values()
            .filter(|t| t.state == TaskState::Queued)
            .map(|t| (t.id, t.created_at))
            .collect();
        queued.sort_by_key(|&(_, created_at)| created_at);

        for (i, (id, _)) in queued.iter().enumerate() {
            if let Some(task) = tasks.get_mut(id) {
                task.queue_position = if i < slots_free { 0 } else { i - slots_free + 1 };
            }
        }

        for task in tasks.values_mut() {
            if task.state != TaskState::Queued {
                task.queue_position = 0;
            }
        }
    }
}
