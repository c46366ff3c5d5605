//! Error types for the persistence coordinator.

use crate::types::StoreId;
use thiserror::Error;

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors that can occur while coordinating persistence.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Another actor modified the same persisted row since it was loaded.
    ///
    /// Raised by the store when the persisted version counter moved; always
    /// triggers the rollback-then-close cascade before being re-thrown.
    #[error("concurrent change on {type_name} ({id}): {message}")]
    Conflict {
        /// Entity type of the conflicting object.
        type_name: String,
        /// Store identifier of the conflicting object.
        id: StoreId,
        /// Description from the store.
        message: String,
    },

    /// Generic store failure during save/update/delete/refresh or a
    /// transaction operation.
    #[error("store failure: {message}")]
    Store {
        /// Description of the failure.
        message: String,
    },

    /// Configuration error, e.g. a relationship declaration that does not
    /// match the entity types it is registered on.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the misconfiguration.
        message: String,
    },

    /// Entity state image could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description from the codec.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl PersistenceError {
    /// Creates a concurrency-conflict error.
    pub fn conflict(type_name: impl Into<String>, id: StoreId, message: impl Into<String>) -> Self {
        Self::Conflict {
            type_name: type_name.into(),
            id,
            message: message.into(),
        }
    }

    /// Creates a generic store failure.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_distinguished() {
        let err = PersistenceError::conflict("Site", StoreId::new(3), "version moved");
        assert!(err.is_conflict());
        assert!(!PersistenceError::store("boom").is_conflict());
    }

    #[test]
    fn display_includes_context() {
        let err = PersistenceError::conflict("Site", StoreId::new(3), "version moved");
        let text = format!("{err}");
        assert!(text.contains("Site"));
        assert!(text.contains("oid:3"));
    }
}
