//! Directory marker protocol.
//!
//! A directory exists if and only if an empty object sits at
//! `<path>/.dir` (`.dir` for the root). Nothing else, not a metadata
//! record and not the presence of children, makes a path a directory.

use bytes::Bytes;
use objfs_storage::Storage;

use crate::error::FsResult;
use crate::path;

/// Base name of the marker object.
pub const DIR_MARKER: &str = ".dir";

/// The marker key for directory `path`.
pub fn marker_key(dir: &str) -> String {
    path::join(dir, DIR_MARKER)
}

/// Returns `true` if `key` is some directory's marker.
pub fn is_marker_key(key: &str) -> bool {
    path::base_name(key) == DIR_MARKER
}

/// Whether the marker for `dir` exists.
pub fn exists(storage: &dyn Storage, dir: &str) -> FsResult<bool> {
    Ok(storage.exists(&marker_key(dir))?)
}

/// Write the marker for `dir`.
pub fn create(storage: &dyn Storage, dir: &str) -> FsResult<()> {
    storage.put(&marker_key(dir), Bytes::new())?;
    Ok(())
}

/// Delete the marker for `dir`.
pub fn delete(storage: &dyn Storage, dir: &str) -> FsResult<()> {
    storage.delete(&marker_key(dir))?;
    Ok(())
}
