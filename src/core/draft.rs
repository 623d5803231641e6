use super::task::{DueDate, Task, mint_task_id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DraftState {
    #[default]
    Empty,
    Editing,
}

/// Scratch copy of a task being added or edited. Not persisted until saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub due_date: DueDate,
    pub is_finished: bool,
    /// Empty until the draft is loaded from, or first saved to, the store.
    pub task_id: String,
    pub owner_id: String,
    pub state: DraftState,
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            is_finished: task.is_finished,
            task_id: task.id.clone(),
            owner_id: task.owner_id.clone(),
            state: DraftState::Editing,
        }
    }

    pub fn is_new(&self) -> bool {
        self.task_id.is_empty()
    }

    /// Build the record to persist, minting an id when the draft has none.
    pub fn to_task(&self, owner_id: &str) -> Task {
        let id = if self.task_id.is_empty() {
            mint_task_id()
        } else {
            self.task_id.clone()
        };
        Task {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            is_finished: self.is_finished,
            owner_id: owner_id.to_string(),
        }
    }
}
