//! Entity cache: the locally known tasks and user profile.
//!
//! All operations are synchronous, infallible and idempotent. Each one runs
//! inside a single critical section, so a reconciliation step is never
//! interleaved with another mutation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{Task, TaskId, User};

#[derive(Debug, Default)]
struct CacheState {
    tasks: Vec<Task>,
    tasks_synced_at: Option<DateTime<Utc>>,
    profile: Option<User>,
    profile_fetched_at: Option<DateTime<Utc>>,
    /// Bumped on every observable change.
    revision: u64,
    /// Bumped on every task write, changed or not.
    tasks_generation: u64,
}

/// Tasks keyed by `task_id`, plus the current user's profile.
#[derive(Debug, Default)]
pub struct EntityCache {
    state: RwLock<CacheState>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Tasks ====================

    /// Replace the whole task list. Duplicate ids collapse to the last one.
    pub fn set_tasks(&self, tasks: Vec<Task>) {
        let deduped = dedupe(tasks);
        replace_tasks(&mut self.write(), deduped);
    }

    /// Replace the task list only if no task write happened since
    /// `generation` was read.
    ///
    /// Returns `false`, leaving the cache untouched, when a create or delete
    /// landed in between; the snapshot may predate it.
    pub fn set_tasks_if_current(&self, tasks: Vec<Task>, generation: u64) -> bool {
        let deduped = dedupe(tasks);
        let mut state = self.write();
        if state.tasks_generation != generation {
            return false;
        }
        replace_tasks(&mut state, deduped);
        true
    }

    /// Counter for [`Self::set_tasks_if_current`].
    pub fn tasks_generation(&self) -> u64 {
        self.read().tasks_generation
    }

    /// Append one task, or replace the cached entry with the same id.
    ///
    /// Tasks without an id are ignored.
    pub fn add_task(&self, task: Task) {
        if task.task_id.is_none() {
            tracing::warn!(title = %task.title, "Ignoring task without an id");
            return;
        }

        let mut state = self.write();
        state.tasks_generation += 1;
        match position_of(&state.tasks, task.task_id) {
            Some(i) if state.tasks[i] == task => {}
            Some(i) => {
                state.tasks[i] = task;
                state.revision += 1;
            }
            None => {
                state.tasks.push(task);
                state.revision += 1;
            }
        }
    }

    /// Drop the task with this id. Unknown ids are a no-op.
    ///
    /// Returns whether anything was removed.
    pub fn remove_task(&self, id: TaskId) -> bool {
        let mut state = self.write();
        state.tasks_generation += 1;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.task_id != Some(id));
        let removed = state.tasks.len() != before;
        if removed {
            state.revision += 1;
        }
        removed
    }

    /// Snapshot of the cached tasks, in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks.clone()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.read()
            .tasks
            .iter()
            .find(|t| t.task_id == Some(id))
            .cloned()
    }

    pub fn task_count(&self) -> usize {
        self.read().tasks.len()
    }

    /// When the list was last replaced from the backend.
    pub fn tasks_synced_at(&self) -> Option<DateTime<Utc>> {
        self.read().tasks_synced_at
    }

    // ==================== Profile ====================

    pub fn profile(&self) -> Option<User> {
        self.read().profile.clone()
    }

    /// Cached profile, only if fetched within `max_age`.
    pub fn fresh_profile(&self, max_age: Duration) -> Option<User> {
        let state = self.read();
        let fetched_at = state.profile_fetched_at?;
        // A negative age means the clock moved backwards; treat as fresh.
        let fresh = Utc::now()
            .signed_duration_since(fetched_at)
            .to_std()
            .map_or(true, |age| age <= max_age);
        if fresh {
            state.profile.clone()
        } else {
            None
        }
    }

    pub fn set_profile(&self, user: User) {
        let mut state = self.write();
        state.profile_fetched_at = Some(Utc::now());
        if state.profile.as_ref() != Some(&user) {
            state.profile = Some(user);
            state.revision += 1;
        }
    }

    pub fn clear_profile(&self) {
        let mut state = self.write();
        state.profile_fetched_at = None;
        if state.profile.take().is_some() {
            state.revision += 1;
        }
    }

    // ==================== Whole cache ====================

    /// Forget everything (sign-out, account deletion).
    pub fn clear(&self) {
        let mut state = self.write();
        let changed = !state.tasks.is_empty() || state.profile.is_some();
        let revision = state.revision + u64::from(changed);
        let tasks_generation = state.tasks_generation + 1;
        *state = CacheState {
            revision,
            tasks_generation,
            ..CacheState::default()
        };
    }

    /// Monotonic change counter for re-render decisions.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }
}

fn dedupe(tasks: Vec<Task>) -> Vec<Task> {
    let mut deduped: Vec<Task> = Vec::with_capacity(tasks.len());
    for task in tasks {
        match position_of(&deduped, task.task_id) {
            Some(i) => deduped[i] = task,
            None => deduped.push(task),
        }
    }
    deduped
}

fn replace_tasks(state: &mut CacheState, tasks: Vec<Task>) {
    state.tasks_generation += 1;
    state.tasks_synced_at = Some(Utc::now());
    if state.tasks != tasks {
        state.tasks = tasks;
        state.revision += 1;
    }
}

/// Index of the task with this id. Tasks without an id never match.
fn position_of(tasks: &[Task], id: Option<TaskId>) -> Option<usize> {
    let id = id?;
    tasks.iter().position(|t| t.task_id == Some(id))
}

/// Shared entity cache.
pub type SharedEntityCache = Arc<EntityCache>;
