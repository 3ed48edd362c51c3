//! Task workflow: list, create and delete, keeping the entity cache in line
//! with the backend.
//!
//! Reconciliation after a mutation is a single-entry patch: a created task is
//! appended from the server's echo, a deleted task is removed by id. A full
//! refresh is only done by [`TaskWorkflow::list`], and only lands if no patch
//! was applied while it was in flight.

use super::auth::AuthSignal;
use super::outcome::{Failure, Outcome, WorkflowResult};
use crate::api::{ApiError, SharedBackend};
use crate::cache::SharedEntityCache;
use crate::models::{Task, TaskDraft, TaskId};

/// List requests issued before giving up on a quiet window.
const MAX_LIST_ATTEMPTS: usize = 3;

pub struct TaskWorkflow {
    backend: SharedBackend,
    cache: SharedEntityCache,
    signal: AuthSignal,
}

impl TaskWorkflow {
    pub fn new(backend: SharedBackend, cache: SharedEntityCache, signal: AuthSignal) -> Self {
        Self {
            backend,
            cache,
            signal,
        }
    }

    fn failure(&self, title: &str, error: ApiError) -> Failure {
        self.signal.note_unauthorized(&error);
        Failure::new(title, error)
    }

    /// Fetch the user's tasks and replace the cached list.
    ///
    /// A snapshot that raced a create or delete is discarded and the list is
    /// fetched again. If every attempt races, the cache keeps its patched
    /// state.
    pub async fn list(&self) -> WorkflowResult<Vec<Task>> {
        for attempt in 1..=MAX_LIST_ATTEMPTS {
            let generation = self.cache.tasks_generation();
            let tasks = self.backend.list_tasks().await.map_err(|e| {
                tracing::error!(kind = %e.kind, "Task loading error: {}", e);
                self.failure("Task Loading Failed", e)
            })?;

            tracing::debug!(count = tasks.len(), attempt, "Fetched tasks");
            if self.cache.set_tasks_if_current(tasks, generation) {
                return Ok(Outcome::new(self.cache.tasks()));
            }
            tracing::debug!(attempt, "Task list changed during fetch, refetching");
        }

        tracing::warn!("Task list kept changing during refresh, keeping cached tasks");
        Ok(Outcome::new(self.cache.tasks()))
    }

    /// Validate and create a task, then append the server's record.
    pub async fn create(&self, draft: &TaskDraft) -> WorkflowResult<Task> {
        draft
            .validate()
            .map_err(|e| Failure::new("Task Creation Failed", e))?;

        let task = self.backend.create_task(draft).await.map_err(|e| {
            tracing::error!(kind = %e.kind, "Task creation error: {}", e);
            self.failure("Task Creation Failed", e)
        })?;

        if task.task_id.is_none() {
            tracing::error!("Backend created a task without assigning an id");
            return Err(Failure::new(
                "Task Creation Failed",
                ApiError::decode("create_task: response has no taskId"),
            ));
        }

        tracing::info!(task_id = ?task.task_id, "Task created");
        self.cache.add_task(task.clone());
        Ok(Outcome::new(task)
            .with_notice("Task Created", "The task has been created successfully!"))
    }

    /// Delete a task on the server, then remove it locally.
    ///
    /// A 404 means someone already deleted it; the local entry is removed
    /// and the call succeeds.
    pub async fn delete(&self, id: TaskId) -> WorkflowResult<()> {
        match self.backend.delete_task(id).await {
            Ok(message) => {
                self.cache.remove_task(id);
                tracing::info!(task_id = id, "Task deleted");
                let message = message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "The task has been deleted successfully.".to_string());
                Ok(Outcome::new(()).with_notice("Task Deleted", message))
            }
            Err(e) if e.is_not_found() => {
                self.cache.remove_task(id);
                tracing::info!(task_id = id, "Task was already deleted on the server");
                Ok(Outcome::new(()).with_notice("Task Deleted", "The task no longer exists."))
            }
            Err(e) => {
                tracing::error!(kind = %e.kind, task_id = id, "Task deletion error: {}", e);
                Err(self.failure("Task Deletion Failed", e))
            }
        }
    }

    /// Cached tasks, for rendering.
    pub fn cached(&self) -> Vec<Task> {
        self.cache.tasks()
    }
}
