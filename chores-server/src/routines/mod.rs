pub mod chores;
pub mod priority;
pub mod relevance;

pub use chores::{ChoreService, Completion, CompletionRecord, RoutineChore};
pub use relevance::{ChoreCountSource, DisplayableRoutine, RoutineService};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i32 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StorageError::InvalidInput(msg) => CoreError::InvalidInput(msg),
            other => CoreError::Storage(other),
        }
    }
}

/// Treats empty and whitespace-only image references as absent.
pub(crate) fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
