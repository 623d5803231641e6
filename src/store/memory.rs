use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::document::{TaskDocument, normalize_listing};
use super::{StoreError, TaskStore};
use crate::core::task::Task;

/// Process-local task collection. Documents keep their insertion order, and
/// an overwrite keeps the original position.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    documents: Mutex<Vec<(String, TaskDocument)>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw document as-is, bypassing normalization.
    pub fn insert_document(&self, id: impl Into<String>, document: TaskDocument) {
        let id = id.into();
        let mut docs = self.lock();
        match docs.iter_mut().find(|(doc_id, _)| *doc_id == id) {
            Some(slot) => slot.1 = document,
            None => docs.push((id, document)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, TaskDocument)>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn put(&self, task: &Task) -> Result<(), StoreError> {
        self.insert_document(task.id.clone(), TaskDocument::from_task(task));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let doc = self
            .lock()
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc.clone());
        doc.map(|d| d.into_task(id)).transpose()
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Task>, StoreError> {
        let matching: Vec<(String, TaskDocument)> = self
            .lock()
            .iter()
            .filter(|(_, doc)| doc.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();
        Ok(normalize_listing(matching))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.lock().retain(|(doc_id, _)| doc_id != id);
        Ok(())
    }

    async fn set_finished(&self, id: &str, is_finished: bool) -> Result<(), StoreError> {
        let mut docs = self.lock();
        let (_, doc) = docs
            .iter_mut()
            .find(|(doc_id, _)| doc_id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        doc.is_finished = Some(is_finished);
        Ok(())
    }
}
