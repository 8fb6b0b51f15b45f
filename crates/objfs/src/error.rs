//! Error types for filesystem operations.

use std::io;

use objfs_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during filesystem operations.
///
/// Path-semantics violations are normalized into the fixed variants so
/// callers can branch on them; raw backend failures pass through untouched
/// as [`FsError::Storage`].
#[derive(Debug, Error)]
pub enum FsError {
    /// The path names neither a file nor a directory.
    #[error("{path}: file does not exist")]
    NotExist { path: String },

    /// The path already exists.
    #[error("{path}: file already exists")]
    AlreadyExists { path: String },

    /// A data operation was attempted on a directory.
    #[error("{path}: is a directory")]
    IsDirectory { path: String },

    /// A directory operation was attempted on something else.
    #[error("{path}: not a directory")]
    NotDirectory { path: String },

    /// The handle's open mode does not allow the operation.
    #[error("{path}: permission denied: {op} not allowed by open mode")]
    PermissionDenied { op: &'static str, path: String },

    /// Bad seek whence, negative resolved offset, or negative size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The handle has been closed.
    #[error("{path}: file already closed")]
    Closed { path: String },

    /// The operation is not supported by this filesystem.
    #[error("{op}: operation not supported")]
    Unsupported { op: &'static str },

    /// Failure reported by the storage backend.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A metadata record could not be encoded or decoded.
    #[error("metadata serialization error: {0}")]
    Serialization(String),

    /// A configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FsError {
    pub fn not_exist(path: impl Into<String>) -> Self {
        FsError::NotExist { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        FsError::AlreadyExists { path: path.into() }
    }

    pub fn is_directory(path: impl Into<String>) -> Self {
        FsError::IsDirectory { path: path.into() }
    }

    pub fn not_directory(path: impl Into<String>) -> Self {
        FsError::NotDirectory { path: path.into() }
    }

    pub fn closed(path: impl Into<String>) -> Self {
        FsError::Closed { path: path.into() }
    }

    pub fn permission_denied(op: &'static str, path: impl Into<String>) -> Self {
        FsError::PermissionDenied {
            op,
            path: path.into(),
        }
    }

    /// Returns `true` for [`FsError::NotExist`].
    pub fn is_not_exist(&self) -> bool {
        matches!(self, FsError::NotExist { .. })
    }

    /// Returns `true` for [`FsError::AlreadyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, FsError::AlreadyExists { .. })
    }

    /// The closest [`io::ErrorKind`] for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::NotExist { .. } => io::ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            FsError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            FsError::Unsupported { .. } => io::ErrorKind::Unsupported,
            FsError::Serialization(_) | FsError::Config(_) => io::ErrorKind::InvalidData,
            FsError::Storage(StorageError::NotFound { .. }) => io::ErrorKind::NotFound,
            FsError::Storage(StorageError::InvalidKey { .. }) => io::ErrorKind::InvalidInput,
            FsError::Storage(StorageError::Io(e)) => e.kind(),
            FsError::IsDirectory { .. }
            | FsError::NotDirectory { .. }
            | FsError::Closed { .. }
            | FsError::Storage(StorageError::Backend(_)) => io::ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(e: serde_json::Error) -> Self {
        FsError::Serialization(e.to_string())
    }
}

/// The wrapped [`FsError`] stays reachable through `get_ref`/`into_inner`.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        io::Error::new(e.kind(), e)
    }
}

/// Convenience type alias for filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;
