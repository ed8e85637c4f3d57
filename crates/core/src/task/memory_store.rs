//! In-memory task registry.
//!
//! Tasks live for the lifetime of the process; nothing is persisted.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::store::{TaskError, TaskMutator, TaskStore};
use super::types::{Task, TaskStatus, WorkflowParameters};

/// Process-scoped task registry guarded by a single `RwLock`.
///
/// Reads share the lock; each `create`/`update`/`clear_terminal` holds the
/// write lock only for the duration of one record mutation, so runs for
/// different tasks never wait on each other beyond that.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Task>>, TaskError> {
        self.tasks
            .read()
            .map_err(|_| TaskError::Storage("task registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Task>>, TaskError> {
        self.tasks
            .write()
            .map_err(|_| TaskError::Storage("task registry lock poisoned".to_string()))
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self, parameters: WorkflowParameters) -> Result<Task, TaskError> {
        let mut tasks = self.write()?;

        let mut id = Uuid::new_v4().to_string();
        while tasks.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let task = Task::new(id.clone(), parameters);
        tasks.insert(id, task.clone());
        Ok(task)
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        Ok(self.read()?.get(id).cloned())
    }

    fn update(&self, id: &str, mutator: TaskMutator<'_>) -> Result<Task, TaskError> {
        let mut tasks = self.write()?;
        let current = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;

        let mut next = current.clone();
        mutator(&mut next);

        if !current.status.can_transition_to(next.status) {
            return Err(TaskError::InvalidTransition {
                task_id: id.to_string(),
                from: current.status,
                to: next.status,
            });
        }
        current
            .check_successor(&next)
            .map_err(|reason| TaskError::InvariantViolation {
                task_id: id.to_string(),
                reason,
            })?;

        *current = next;
        Ok(current.clone())
    }

    fn list(&self) -> Result<Vec<Task>, TaskError> {
        let mut tasks: Vec<Task> = self.read()?.values().cloned().collect();
        tasks.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn clear_terminal(&self) -> Result<usize, TaskError> {
        let mut tasks = self.write()?;
        let before = tasks.len();
        tasks.retain(|_, task| !task.status.is_terminal());
        Ok(before - tasks.len())
    }

    fn count_by_status(&self, status: TaskStatus) -> Result<usize, TaskError> {
        Ok(self
            .read()?
            .values()
            .filter(|task| task.status == status)
            .count())
    }

    fn len(&self) -> Result<usize, TaskError> {
        Ok(self.read()?.len())
    }
}
