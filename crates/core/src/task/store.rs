//! Task storage trait and errors.

use std::fmt;

use crate::task::{Task, TaskStatus, WorkflowParameters};

/// Error type for task operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task not found.
    NotFound(String),
    /// The mutation would move the status backwards or out of a terminal state.
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// The mutation would break another record invariant.
    InvariantViolation { task_id: String, reason: String },
    /// Storage backend failure.
    Storage(String),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::NotFound(id) => write!(f, "Task not found: {}", id),
            TaskError::InvalidTransition { task_id, from, to } => write!(
                f,
                "Cannot move task {} from {} to {}",
                task_id, from, to
            ),
            TaskError::InvariantViolation { task_id, reason } => {
                write!(f, "Rejected update of task {}: {}", task_id, reason)
            }
            TaskError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for TaskError {}

/// In-place mutation applied to a task record under the store's lock.
pub type TaskMutator<'a> = &'a mut dyn FnMut(&mut Task);

/// Trait for task registries.
///
/// Every method must be safe to call concurrently. `update` applies a whole
/// mutation or none of it; readers never observe a half-updated record.
pub trait TaskStore: Send + Sync {
    /// Allocate a fresh id and store a new `initiated` task.
    fn create(&self, parameters: WorkflowParameters) -> Result<Task, TaskError>;

    /// Get a task by ID.
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError>;

    /// Apply `mutator` to the task and return the committed record.
    ///
    /// The mutated copy is checked with [`Task::check_successor`] before it
    /// replaces the stored record.
    fn update(&self, id: &str, mutator: TaskMutator<'_>) -> Result<Task, TaskError>;

    /// Snapshot of all tasks, oldest first.
    fn list(&self) -> Result<Vec<Task>, TaskError>;

    /// Remove every `completed` or `failed` task; returns how many were removed.
    fn clear_terminal(&self) -> Result<usize, TaskError>;

    /// Count tasks with the given status.
    fn count_by_status(&self, status: TaskStatus) -> Result<usize, TaskError>;

    /// Total number of tasks.
    fn len(&self) -> Result<usize, TaskError>;

    fn is_empty(&self) -> Result<bool, TaskError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskError::NotFound("task-456".to_string());
        assert_eq!(err.to_string(), "Task not found: task-456");

        let err = TaskError::InvalidTransition {
            task_id: "task-1".to_string(),
            from: TaskStatus::Completed,
            to: TaskStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            "Cannot move task task-1 from completed to running"
        );
    }
}
