//! Observable list of the current user's tasks.
//!
//! Every successful mutation is followed by a full reload from the store; the
//! list is never patched locally. The published list is therefore eventually
//! consistent with the store: when several reloads are in flight, the one
//! issued last wins and older responses are dropped on arrival.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use super::TaskError;
use crate::core::task::Task;
use crate::store::TaskStore;

/// Snapshot published to the front-end after each applied reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListState {
    pub owner_id: String,
    pub tasks: Vec<Task>,
    /// Reload request this snapshot came from. Zero before the first load.
    pub generation: u64,
}

pub struct TaskListController {
    store: Arc<dyn TaskStore>,
    state: watch::Sender<TaskListState>,
    issued: AtomicU64,
}

impl TaskListController {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        let (state, _) = watch::channel(TaskListState::default());
        Self {
            store,
            state,
            issued: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskListState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TaskListState {
        self.state.borrow().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    /// Replace the list with every task owned by `user_id`.
    ///
    /// An empty `user_id` is a no-op. On failure the current list is kept.
    pub async fn load_tasks(&self, user_id: &str) -> Result<(), TaskError> {
        if user_id.is_empty() {
            log::debug!("Not loading tasks: no user");
            return Ok(());
        }

        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Loading tasks for {} (generation {})", user_id, generation);

        match self.store.query_by_owner(user_id).await {
            Ok(tasks) => {
                self.apply(user_id, tasks, generation);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load tasks for {}: {}", user_id, e);
                Err(e.into())
            }
        }
    }

    /// Reload after a write that already succeeded. A failure here is reported
    /// as [`TaskError::StaleView`], never as a failed write.
    async fn reload_after_write(&self, user_id: &str) -> Result<(), TaskError> {
        match self.load_tasks(user_id).await {
            Err(TaskError::Store(e)) => Err(TaskError::StaleView(e)),
            other => other,
        }
    }

    /// Publish a reload result unless a newer one is already showing.
    fn apply(&self, owner_id: &str, tasks: Vec<Task>, generation: u64) -> bool {
        let count = tasks.len();
        let applied = self.state.send_if_modified(|state| {
            if generation <= state.generation {
                return false;
            }
            *state = TaskListState {
                owner_id: owner_id.to_string(),
                tasks,
                generation,
            };
            true
        });

        if applied {
            log::info!("Loaded {} tasks for {}", count, owner_id);
        } else {
            log::debug!("Dropped stale reload {} for {}", generation, owner_id);
        }
        applied
    }

    /// Overwrite (or create) the task at `task.id`, then reload its owner's list.
    ///
    /// `Err(TaskError::Store)` means nothing was written; `Err(TaskError::StaleView)`
    /// means the task was saved but the list was not refreshed.
    pub async fn create_or_update(&self, task: &Task) -> Result<(), TaskError> {
        if task.id.is_empty() {
            log::error!("Cannot save task: missing task id");
            return Err(TaskError::MissingId("task id"));
        }
        if task.owner_id.is_empty() {
            log::error!("Cannot save task {}: missing owner id", task.id);
            return Err(TaskError::MissingId("owner id"));
        }

        if let Err(e) = self.store.put(task).await {
            log::error!("Failed to save task {}: {}", task.id, e);
            return Err(e.into());
        }
        log::info!("Saved task {}", task.id);
        self.reload_after_write(&task.owner_id).await
    }

    /// Remove a task, then reload. Removing an unknown id still reloads.
    /// A failed reload is reported as [`TaskError::StaleView`].
    pub async fn delete(&self, task_id: &str, user_id: &str) -> Result<(), TaskError> {
        if task_id.is_empty() {
            log::error!("Cannot delete task: missing task id");
            return Err(TaskError::MissingId("task id"));
        }

        if let Err(e) = self.store.delete(task_id).await {
            log::error!("Failed to delete task {}: {}", task_id, e);
            return Err(e.into());
        }
        log::info!("Deleted task {}", task_id);
        self.reload_after_write(user_id).await
    }

    /// Flip only the completion flag, then reload. A failed reload is reported
    /// as [`TaskError::StaleView`].
    pub async fn set_completion(
        &self,
        task_id: &str,
        is_finished: bool,
        user_id: &str,
    ) -> Result<(), TaskError> {
        if task_id.is_empty() {
            log::error!("Cannot update task: missing task id");
            return Err(TaskError::MissingId("task id"));
        }

        if let Err(e) = self.store.set_finished(task_id, is_finished).await {
            log::error!("Failed to update task {}: {}", task_id, e);
            return Err(e.into());
        }
        log::info!("Task {} finished: {}", task_id, is_finished);
        self.reload_after_write(user_id).await
    }
}
