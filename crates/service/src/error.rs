//! Service error types.

use domain::{DomainError, RuleKind};
use repository::RepositoryError;
use thiserror::Error;

/// Errors returned by command handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// A domain operation was rejected.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Loading or storing an aggregate failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A handler failed for a reason of its own.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl ServiceError {
    /// Returns the broken rule's kind, if a business rule was violated.
    pub fn rule_kind(&self) -> Option<RuleKind> {
        match self {
            ServiceError::Domain(err) => err.rule_kind(),
            _ => None,
        }
    }

    /// Returns true if an aggregate could not be found.
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Repository(err) => err.is_not_found(),
            ServiceError::Domain(err) => matches!(err, DomainError::EntityNotFound { .. }),
            ServiceError::Handler(_) => false,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
