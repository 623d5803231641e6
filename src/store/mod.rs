pub mod document;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;

use crate::core::task::Task;

/// Failure of a single remote store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store returned {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid store payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed task document {id}: {reason}")]
    Malformed { id: String, reason: String },
    #[error("task {id} not found")]
    NotFound { id: String },
    #[error("invalid store endpoint {0}")]
    Endpoint(String),
}

/// Document collection of tasks keyed by task id, queryable by owner.
///
/// Writes are last-write-wins per document; callers add no locking of their own.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create or fully overwrite the document at `task.id`.
    async fn put(&self, task: &Task) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Every task owned by `owner_id`, in the order the store returns them.
    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Task>, StoreError>;

    /// Remove a document. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Update only the completion flag of an existing document.
    async fn set_finished(&self, id: &str, is_finished: bool) -> Result<(), StoreError>;
}
