//! Domain error types.

use thiserror::Error;

use crate::rules::{BusinessRuleViolation, RuleKind};

/// Errors that can occur during domain operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A business rule was broken; nothing was changed.
    #[error("Business rule violation: {0}")]
    RuleViolation(#[from] BusinessRuleViolation),

    /// The entity was discarded and accepts no further mutation.
    #[error("{entity} {id} is discarded")]
    Discarded { entity: &'static str, id: String },

    /// A child entity or value referenced by id does not exist.
    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: &'static str, id: String },
}

impl DomainError {
    /// Returns the broken rule's kind, if this is a rule violation.
    pub fn rule_kind(&self) -> Option<RuleKind> {
        match self {
            DomainError::RuleViolation(violation) => Some(violation.kind),
            _ => None,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::EntityNotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
