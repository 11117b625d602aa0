use dashmap::DashMap;

use crate::task::TaskStatus;

/// Externally-owned task-state store the executor writes into.
///
/// The executor records terminal status transitions and, on completion,
/// the full HTML result so a reload can redisplay it without
/// re-executing.
pub trait TaskStore: Send + Sync {
    /// Records the status for a task index.
    fn set_status(&self, task_index: usize, status: TaskStatus);

    /// Returns the recorded status for a task index.
    fn status(&self, task_index: usize) -> Option<TaskStatus>;

    /// Persists the completed HTML result for a task index.
    fn save_html_result(&self, task_index: usize, html: String);

    /// Returns the persisted HTML result for a task index.
    fn html_result(&self, task_index: usize) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
struct TaskEntry {
    status: Option<TaskStatus>,
    html_result: Option<String>,
}

/// Concurrent in-memory `TaskStore`.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    entries: DashMap<usize, TaskEntry>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn set_status(&self, task_index: usize, status: TaskStatus) {
        self.entries.entry(task_index).or_default().status = Some(status);
    }

    fn status(&self, task_index: usize) -> Option<TaskStatus> {
        self.entries.get(&task_index).and_then(|entry| entry.status)
    }

    fn save_html_result(&self, task_index: usize, html: String) {
        self.entries.entry(task_index).or_default().html_result = Some(html);
    }

    fn html_result(&self, task_index: usize) -> Option<String> {
        self.entries
            .get(&task_index)
            .and_then(|entry| entry.html_result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_result_are_kept_per_task_index() {
        let store = InMemoryTaskStore::new();
        store.set_status(0, TaskStatus::Completed);
        store.save_html_result(0, "<p>ok</p>".into());
        store.set_status(1, TaskStatus::Error);

        assert_eq!(store.status(0), Some(TaskStatus::Completed));
        assert_eq!(store.html_result(0).as_deref(), Some("<p>ok</p>"));
        assert_eq!(store.status(1), Some(TaskStatus::Error));
        assert_eq!(store.html_result(1), None);
        assert_eq!(store.status(2), None);
    }
}
