//! Error types for storage backends.

use thiserror::Error;

/// Errors from object storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key does not exist.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// The key was rejected before reaching the backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Shorthand for a [`StorageError::NotFound`] on `key`.
    pub fn not_found(key: impl Into<String>) -> Self {
        StorageError::NotFound { key: key.into() }
    }

    /// Returns `true` if this error means the key does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
