use bytes::Bytes;

use crate::error::StorageResult;
use crate::list::{ListOptions, ListResult};

/// Flat key-value object store.
///
/// All implementations must satisfy these invariants:
/// - A put replaces the whole object at `key`; there are no partial writes.
/// - `get` and `delete` on a missing key return [`StorageError::NotFound`].
/// - Keys are opaque: the store never interprets `/` or any other character.
/// - All I/O errors are propagated, never silently ignored.
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
pub trait Storage: Send + Sync {
    /// Store `data` at `key`, replacing any existing object.
    fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Read the whole object at `key`.
    fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete the object at `key`.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Return every key that starts with `prefix`, in no particular order.
    fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Check whether an object exists at `key`.
    ///
    /// Default implementation fetches the object. Backends may override
    /// with a cheaper probe.
    fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Hierarchical listing capability.
///
/// Not every backend can group keys by delimiter or paginate, so this is a
/// separate trait. Consumers resolve it once, when they are built, instead
/// of probing the backend at call time.
pub trait DelimitedList: Send + Sync {
    /// List one page of objects and common prefixes.
    fn list_with_options(&self, opts: &ListOptions) -> StorageResult<ListResult>;
}
