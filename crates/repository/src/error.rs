use common::Version;
use thiserror::Error;

/// Errors that can occur when interacting with a repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The aggregate does not exist, or was discarded.
    #[error("{aggregate_type} not found: {id}")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },

    /// An aggregate with the same id was already added.
    #[error("{aggregate_type} already exists: {id}")]
    AlreadyExists {
        aggregate_type: &'static str,
        id: String,
    },

    /// The stored version moved since the aggregate was loaded.
    #[error(
        "Concurrency conflict for {aggregate_type} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },
}

impl RepositoryError {
    pub fn not_found(aggregate_type: &'static str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            aggregate_type,
            id: id.to_string(),
        }
    }

    /// Returns true if the aggregate is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
