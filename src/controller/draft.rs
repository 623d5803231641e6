use std::sync::Arc;

use super::TaskError;
use crate::core::draft::{DraftState, TaskDraft};
use crate::core::task::{DueDate, Task};
use crate::store::TaskStore;

/// The only failure text shown to the user; every other failure is silent.
pub const SAVE_FAILED_MESSAGE: &str = "error saving task";

/// Holds the add/edit form for a single task.
pub struct TaskDraftController {
    store: Arc<dyn TaskStore>,
    draft: TaskDraft,
}

impl TaskDraftController {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            draft: TaskDraft::default(),
        }
    }

    pub fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
        self.draft.state = DraftState::Editing;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
        self.draft.state = DraftState::Editing;
    }

    pub fn set_due_date(&mut self, due_date: DueDate) {
        self.draft.due_date = due_date;
        self.draft.state = DraftState::Editing;
    }

    pub fn set_finished(&mut self, is_finished: bool) {
        self.draft.is_finished = is_finished;
        self.draft.state = DraftState::Editing;
    }

    pub fn reset(&mut self) {
        self.draft = TaskDraft::default();
    }

    /// Replace every draft field with the stored task.
    ///
    /// When the task does not exist the draft is left as it was and
    /// `NotFound` is returned.
    pub async fn load(&mut self, task_id: &str) -> Result<(), TaskError> {
        if task_id.is_empty() {
            log::error!("Cannot load task: missing task id");
            return Err(TaskError::MissingId("task id"));
        }

        match self.store.get(task_id).await {
            Ok(Some(task)) => {
                log::debug!("Loaded task {} into draft", task_id);
                self.draft = TaskDraft::from_task(&task);
                Ok(())
            }
            Ok(None) => {
                log::warn!("Task {} not found, draft unchanged", task_id);
                Err(TaskError::NotFound {
                    id: task_id.to_string(),
                })
            }
            Err(e) => {
                log::error!("Failed to load task {}: {}", task_id, e);
                Err(e.into())
            }
        }
    }

    /// Persist the draft for `user_id` and return the stored record.
    ///
    /// A draft without an id gets a fresh one, which it keeps afterwards so
    /// later saves overwrite the same record. The front-end reloads the task
    /// list after a successful save and shows [`SAVE_FAILED_MESSAGE`] otherwise.
    pub async fn save(&mut self, user_id: &str) -> Result<Task, TaskError> {
        if user_id.is_empty() {
            log::error!("Cannot save draft: no signed-in user");
            return Err(TaskError::NoSession);
        }

        let task = self.draft.to_task(user_id);
        if let Err(e) = self.store.put(&task).await {
            log::error!("Failed to save task {}: {}", task.id, e);
            return Err(e.into());
        }

        log::info!(
            "{} task {}",
            if self.draft.is_new() { "Created" } else { "Updated" },
            task.id
        );
        self.draft.task_id = task.id.clone();
        self.draft.owner_id = task.owner_id.clone();
        self.draft.state = DraftState::Editing;
        Ok(task)
    }
}
