use std::fmt;
use std::time::Duration;

/// Opaque identifier for a task as known to the agent-run API.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Creates a task id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the task id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Lifecycle status of a task entry in the task list.
///
/// `Pending` and `Running` are set by the invoking UI; the executor only
/// transitions a task to one of the terminal states.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Generic execution behavior options.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ExecOptions {
    /// Optional per-execution timeout applied to the HTTP request.
    ///
    /// Cancellation via the abort handle is independent of this timeout.
    pub timeout: Option<Duration>,
}

impl ExecOptions {
    /// Sets the per-execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Cancelled).expect("serialize");
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn task_id_display_matches_inner() {
        assert_eq!(TaskId::new("t-1").to_string(), "t-1");
    }
}
