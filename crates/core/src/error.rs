//! Error taxonomy shared by every LendLedger operation
//!
//! Each variant renders with a stable prefix (`NOT_FOUND: ...`) so callers
//! on the far side of the invocation surface can grep for the category.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Missing or malformed input; the caller can resubmit corrected input
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    #[error("ACCESS_DENIED: {0}")]
    AccessDenied(String),

    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    #[error("ALREADY_EXISTS: {0}")]
    AlreadyExists(String),

    #[error("INVALID_TRANSITION: {entity_type} cannot move from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        from: String,
        to: String,
    },

    /// Stored digest or audit-trail invariant does not hold
    #[error("INTEGRITY_ERROR: {0}")]
    Integrity(String),

    /// Optimistic-concurrency collision; retry the whole invocation
    #[error("CONFLICT_ERROR: {0}")]
    Conflict(String),

    #[error("STORAGE_ERROR: {0}")]
    Storage(String),
}

/// Coarse error category, serialized into invocation error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    ValidationError,
    AccessDenied,
    NotFound,
    AlreadyExists,
    InvalidTransition,
    IntegrityError,
    ConflictError,
    StorageError,
}

impl LedgerError {
    /// Shorthand for the common "<field> is required" validation failure
    pub fn required(field: &str) -> Self {
        LedgerError::Validation(format!("{} is required", field))
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        LedgerError::NotFound(format!("{} {} not found", entity, id))
    }

    pub fn invalid_transition(
        entity_type: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        LedgerError::InvalidTransition {
            entity_type: entity_type.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::Validation(_) => ErrorCategory::ValidationError,
            LedgerError::AccessDenied(_) => ErrorCategory::AccessDenied,
            LedgerError::NotFound(_) => ErrorCategory::NotFound,
            LedgerError::AlreadyExists(_) => ErrorCategory::AlreadyExists,
            LedgerError::InvalidTransition { .. } => ErrorCategory::InvalidTransition,
            LedgerError::Integrity(_) => ErrorCategory::IntegrityError,
            LedgerError::Conflict(_) => ErrorCategory::ConflictError,
            LedgerError::Storage(_) => ErrorCategory::StorageError,
        }
    }

    /// Only commit conflicts are worth retrying; everything else is a logical fault
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Validation(format!("malformed JSON: {}", err))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
