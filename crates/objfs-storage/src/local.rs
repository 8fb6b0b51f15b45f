//! Local-disk object store.
//!
//! [`LocalStorage`] keeps one file per key under a root directory. Object
//! keys are flat strings, so a key may be both an object and the prefix of
//! other keys (`a` and `a/b`). To keep that representable on disk, every
//! key component is encoded with a suffix: intermediate components become
//! `<name>.d` directories and the final component becomes a `<name>.o` file.
//! The key `docs/readme.txt` is stored at `<root>/docs.d/readme.txt.o`.
//!
//! Writes go to a temporary file in the target directory and are renamed
//! into place, so a reader never observes a half-written object.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StorageError, StorageResult};
use crate::list::{paginate, ListOptions, ListResult, ObjectMeta};
use crate::traits::{DelimitedList, Storage};
use crate::validation::validate_key;

const DIR_SUFFIX: &str = ".d";
const OBJECT_SUFFIX: &str = ".o";

/// Configuration for a [`LocalStorage`] backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Directory holding the encoded object tree.
    pub root: PathBuf,
    /// Create `root` (and its parents) when it does not exist.
    pub create_root: bool,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            create_root: true,
        }
    }
}

/// Object store backed by a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Open a store rooted at `config.root`.
    pub fn open(config: &LocalStorageConfig) -> StorageResult<Self> {
        if config.create_root {
            fs::create_dir_all(&config.root)?;
        } else if !config.root.is_dir() {
            return Err(StorageError::Backend(format!(
                "storage root {} is not a directory",
                config.root.display()
            )));
        }
        debug!(root = %config.root.display(), "local storage opened");
        Ok(Self {
            root: config.root.clone(),
        })
    }

    /// Open a store rooted at `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        Self::open(&LocalStorageConfig {
            root: root.into(),
            create_root: true,
        })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto its on-disk path.
    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        let mut components = key.split('/').peekable();
        while let Some(component) = components.next() {
            if components.peek().is_some() {
                path.push(format!("{component}{DIR_SUFFIX}"));
            } else {
                path.push(format!("{component}{OBJECT_SUFFIX}"));
            }
        }
        Ok(path)
    }

    /// Map an on-disk file back onto its key, if it is an object file.
    fn decode_key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts: Vec<&str> = rel
            .iter()
            .map(|c| c.to_str())
            .collect::<Option<Vec<_>>>()?;
        let last = parts.pop()?.strip_suffix(OBJECT_SUFFIX)?;
        let mut key = String::new();
        for part in parts {
            key.push_str(part.strip_suffix(DIR_SUFFIX)?);
            key.push('/');
        }
        key.push_str(last);
        Some(key)
    }

    /// Walk the tree and return every key starting with `prefix`, sorted,
    /// together with its file attributes.
    fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, Option<ObjectMeta>)>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = self.decode_key(entry.path()) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let meta = entry.metadata().ok().map(|m| ObjectMeta {
                size: m.len() as i64,
                last_modified: m.modified().ok().map(DateTime::<Utc>::from),
            });
            entries.push((key, meta));
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(entries)
    }

    /// Remove empty encoded directories from `dir` up to (excluding) the root.
    fn prune_empty_dirs(&self, mut dir: Option<&Path>) {
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails on a non-empty directory, which ends the walk.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

impl Storage for LocalStorage {
    fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.object_path(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".objfs-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        debug!(key, len = data.len(), "local put");
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_dirs(path.parent());
                debug!(key, "local delete");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self.scan(prefix)?.into_iter().map(|(k, _)| k).collect())
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.object_path(key)?.is_file())
    }
}

impl DelimitedList for LocalStorage {
    fn list_with_options(&self, opts: &ListOptions) -> StorageResult<ListResult> {
        let entries = self.scan(&opts.prefix)?;
        Ok(paginate(entries, opts))
    }
}
