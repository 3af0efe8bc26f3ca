//! Store errors

use lendledger_core::LedgerError;
use thiserror::Error;

/// Errors from the key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Write conflict on key {key}: read version {read}, committed version {current}")]
    Conflict { key: String, read: u64, current: u64 },

    #[error("Range read over prefix {prefix:?} changed since it was read")]
    PhantomRead { prefix: String },

    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("Invalid key component {0:?}")]
    InvalidKey(String),

    #[error("Corrupt ledger file at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::PhantomRead { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::PhantomRead { .. } => {
                LedgerError::Conflict(err.to_string())
            }
            StoreError::KeyExists(_) => LedgerError::Integrity(err.to_string()),
            StoreError::InvalidKey(_) => LedgerError::Validation(err.to_string()),
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_map_to_retryable_error() {
        let err: LedgerError = StoreError::Conflict {
            key: "LOAN_1".into(),
            read: 3,
            current: 4,
        }
        .into();
        assert!(err.is_retryable());

        let err: LedgerError = StoreError::PhantomRead { prefix: "X".into() }.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_overwrite_maps_to_integrity() {
        let err: LedgerError = StoreError::KeyExists("H".into()).into();
        assert!(matches!(err, LedgerError::Integrity(_)));
    }
}
