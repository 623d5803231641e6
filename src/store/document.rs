use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::core::task::{DueDate, Task};

/// A task as it sits in the document store, before normalization.
///
/// Every field is optional because documents written by older clients may
/// lack any of them. [`TaskDocument::into_task`] is the only place defaults
/// are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    #[serde(rename = "taskName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "taskDescription", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "taskDueDate", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(rename = "taskIsFinished", default, skip_serializing_if = "Option::is_none")]
    pub is_finished: Option<bool>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

pub const FIELD_NAME: &str = "taskName";
pub const FIELD_DESCRIPTION: &str = "taskDescription";
pub const FIELD_DUE_DATE: &str = "taskDueDate";
pub const FIELD_IS_FINISHED: &str = "taskIsFinished";
pub const FIELD_OWNER: &str = "userId";

impl TaskDocument {
    pub fn from_task(task: &Task) -> Self {
        Self {
            name: Some(task.name.clone()),
            description: Some(task.description.clone()),
            due_date: Some(task.due_date.as_stored()),
            is_finished: Some(task.is_finished),
            owner_id: Some(task.owner_id.clone()),
        }
    }

    /// Produce a fully populated task keyed by the document id.
    ///
    /// Missing text fields become empty, a missing flag is `false` and a
    /// missing or sentinel due date is unset. A document without an owner, or
    /// with a due date that does not parse, is malformed.
    pub fn into_task(self, id: &str) -> Result<Task, StoreError> {
        let malformed = |reason: String| StoreError::Malformed {
            id: id.to_string(),
            reason,
        };

        let owner_id = self
            .owner_id
            .filter(|o| !o.is_empty())
            .ok_or_else(|| malformed(format!("missing {}", FIELD_OWNER)))?;

        let due_date = match self.due_date {
            Some(raw) => raw
                .parse::<DueDate>()
                .map_err(|e| malformed(e.to_string()))?,
            None => DueDate::Unset,
        };

        Ok(Task {
            id: id.to_string(),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            due_date,
            is_finished: self.is_finished.unwrap_or(false),
            owner_id,
        })
    }
}

/// Normalize a listing, dropping documents that cannot become tasks.
pub fn normalize_listing(documents: Vec<(String, TaskDocument)>) -> Vec<Task> {
    documents
        .into_iter()
        .filter_map(|(id, doc)| match doc.into_task(&id) {
            Ok(task) => Some(task),
            Err(e) => {
                log::warn!("Skipping task document: {}", e);
                None
            }
        })
        .collect()
}
