//! Sidecar metadata records.
//!
//! Every file or directory may carry a JSON [`FileInfo`] record at
//! `.meta/<path>`. The record and its primary key (the data object for a
//! file, the marker for a directory) are separate objects: the backend does
//! not tie their lifecycles together. [`KeyPair`] names both sides and
//! [`Sidecar::remove_pair`] always touches both, in a fixed order, so a
//! half-deleted pair is a visible, testable outcome instead of a forgotten
//! key.

use bytes::Bytes;
use objfs_storage::Storage;
use tracing::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::info::FileInfo;
use crate::marker;

/// Key prefix under which metadata records live.
pub const META_PREFIX: &str = ".meta/";

/// The metadata key for `path`.
pub fn meta_key(path: &str) -> String {
    format!("{META_PREFIX}{path}")
}

/// Returns `true` if `key` lies in the metadata namespace.
pub fn is_meta_key(key: &str) -> bool {
    key.starts_with(META_PREFIX)
}

/// The two keys a filesystem entry occupies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    /// Data key (files) or marker key (directories).
    pub primary: String,
    /// Metadata record key.
    pub meta: String,
}

impl KeyPair {
    pub fn for_file(path: &str) -> Self {
        Self {
            primary: path.to_string(),
            meta: meta_key(path),
        }
    }

    pub fn for_dir(path: &str) -> Self {
        Self {
            primary: marker::marker_key(path),
            meta: meta_key(path),
        }
    }
}

/// Reads and writes metadata records through a storage backend.
pub struct Sidecar<'a> {
    storage: &'a dyn Storage,
}

impl<'a> Sidecar<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Load the record for `path`; `Ok(None)` when there is none.
    pub fn load(&self, path: &str) -> FsResult<Option<FileInfo>> {
        match self.storage.get(&meta_key(path)) {
            Ok(data) => FileInfo::from_json(&data).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`load`](Self::load), but a record that does not decode is
    /// logged and treated as absent. Backend errors still propagate.
    pub fn load_tolerant(&self, path: &str) -> FsResult<Option<FileInfo>> {
        match self.load(path) {
            Err(FsError::Serialization(e)) => {
                warn!(path, error = %e, "ignoring undecodable metadata record");
                Ok(None)
            }
            other => other,
        }
    }

    /// Load the record for `path`, failing [`FsError::NotExist`] when absent.
    pub fn require(&self, path: &str) -> FsResult<FileInfo> {
        self.load(path)?.ok_or_else(|| FsError::not_exist(path))
    }

    /// Write (create or replace) the record for `path`.
    pub fn store(&self, path: &str, info: &FileInfo) -> FsResult<()> {
        let data = info.to_json()?;
        self.storage.put(&meta_key(path), Bytes::from(data))?;
        Ok(())
    }

    /// Delete the record for `path`. Returns `false` if there was none.
    pub fn delete(&self, path: &str) -> FsResult<bool> {
        match self.storage.delete(&meta_key(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete both keys of `pair`: primary first, then the record.
    ///
    /// A failure deleting the primary leaves both keys in place. A failure
    /// deleting the record leaves it orphaned and is returned. A missing
    /// record is not an error.
    pub fn remove_pair(&self, pair: &KeyPair) -> FsResult<()> {
        self.storage.delete(&pair.primary)?;
        match self.storage.delete(&pair.meta) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(key = %pair.meta, error = %e, "orphaned metadata record");
                return Err(e.into());
            }
        }
        debug!(primary = %pair.primary, "removed key pair");
        Ok(())
    }
}
