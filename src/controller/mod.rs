pub mod auth;
pub mod draft;
pub mod task_list;

use crate::store::StoreError;

/// Outcome of a controller operation that did not go through.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A required identifier was empty; nothing was sent to the store.
    #[error("missing {0}")]
    MissingId(&'static str),
    #[error("no signed-in user")]
    NoSession,
    #[error("task {id} not found")]
    NotFound { id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The write reached the store but the follow-up reload did not, so the
    /// published list predates it.
    #[error("saved, but reloading the list failed: {0}")]
    StaleView(StoreError),
}
