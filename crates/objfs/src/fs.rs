use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use objfs_storage::{DelimitedList, Storage};
use tracing::{debug, warn};

use crate::config::FsConfig;
use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::file::StorageFile;
use crate::info::{DirEntry, FileInfo};
use crate::listing;
use crate::marker;
use crate::mode::{FileMode, OpenFlags};
use crate::path;
use crate::sidecar::{self, KeyPair};

/// What a path currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Dir,
    File,
}

/// Filesystem façade over a storage backend.
///
/// Holds no state of its own beyond the backend handle and configuration;
/// every call goes straight to storage. Cloning is cheap and clones share
/// the backend.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use objfs::{FileMode, StorageFs};
/// use objfs_storage::InMemoryStorage;
///
/// let fs = StorageFs::from_backend(Arc::new(InMemoryStorage::new()));
/// fs.mkdir_all("docs/notes", FileMode::from_bits(0o755)).unwrap();
/// fs.write_file("docs/notes/todo.txt", b"ship it", FileMode::from_bits(0o644)).unwrap();
///
/// assert_eq!(fs.read_file("docs/notes/todo.txt").unwrap(), b"ship it");
/// assert!(fs.stat("docs/notes").unwrap().is_dir());
/// ```
#[derive(Clone, Debug)]
pub struct StorageFs {
    ctx: Arc<FsContext>,
}

impl StorageFs {
    /// A filesystem over a backend without hierarchical listing.
    /// Directory listings are always empty.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::build(storage, None, FsConfig::default())
    }

    /// A filesystem whose directory listings go through `lister`.
    pub fn with_lister(storage: Arc<dyn Storage>, lister: Arc<dyn DelimitedList>) -> Self {
        Self::build(storage, Some(lister), FsConfig::default())
    }

    /// A filesystem over a backend that also lists hierarchically.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: Storage + DelimitedList + 'static,
    {
        let storage: Arc<dyn Storage> = backend.clone();
        let lister: Arc<dyn DelimitedList> = backend;
        Self::build(storage, Some(lister), FsConfig::default())
    }

    /// Replace the configuration.
    pub fn with_config(self, config: FsConfig) -> Self {
        Self::build(self.ctx.storage.clone(), self.ctx.lister.clone(), config)
    }

    fn build(
        storage: Arc<dyn Storage>,
        lister: Option<Arc<dyn DelimitedList>>,
        config: FsConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(FsContext {
                storage,
                lister,
                config,
            }),
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.ctx.config
    }

    /// The backend this filesystem writes to.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.ctx.storage
    }

    /// Whether directory listings are available.
    pub fn can_list(&self) -> bool {
        self.ctx.lister.is_some()
    }

    /// Identifier of this filesystem.
    pub fn name(&self) -> &str {
        &self.ctx.config.name
    }

    fn classify(&self, path: &str) -> FsResult<Option<Kind>> {
        if self.ctx.dir_exists(path)? {
            Ok(Some(Kind::Dir))
        } else if self.ctx.data_exists(path)? {
            Ok(Some(Kind::File))
        } else {
            Ok(None)
        }
    }

    fn not_root(path: &str, op: &str) -> FsResult<()> {
        if path::is_root(path) {
            return Err(FsError::InvalidArgument(format!("cannot {op} the root directory")));
        }
        Ok(())
    }

    // ---- Opening files ----

    /// Create or truncate `name` for reading and writing.
    pub fn create(&self, name: &str) -> FsResult<StorageFile> {
        self.open_file(
            name,
            OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            self.ctx.config.create_mode,
        )
    }

    /// Open `name` read-only.
    pub fn open(&self, name: &str) -> FsResult<StorageFile> {
        self.open_file(name, OpenFlags::READ_ONLY, FileMode::default())
    }

    /// Open `name` with explicit flags. `perm` seeds the attributes of a
    /// file that has no metadata record yet.
    pub fn open_file(&self, name: &str, flags: OpenFlags, perm: FileMode) -> FsResult<StorageFile> {
        StorageFile::open(Arc::clone(&self.ctx), path::normalize(name), flags, perm)
    }

    // ---- Directories ----

    /// Create a single directory.
    ///
    /// Writes the marker, then the record. If the record cannot be written
    /// the marker is deleted again; a failure of that cleanup is logged and
    /// the record error is returned.
    pub fn mkdir(&self, name: &str, perm: FileMode) -> FsResult<()> {
        let name = path::normalize(name);
        if self.ctx.dir_exists(&name)? || self.ctx.data_exists(&name)? {
            return Err(FsError::already_exists(name));
        }

        marker::create(self.ctx.storage(), &name)?;

        let info = FileInfo::new(path::base_name(&name), 0, perm.with_dir(), Utc::now(), true);
        if let Err(e) = self.ctx.sidecar().store(&name, &info) {
            if let Err(cleanup) = marker::delete(self.ctx.storage(), &name) {
                warn!(
                    path = %name,
                    error = %cleanup,
                    "failed to remove marker after mkdir failure"
                );
            }
            return Err(e);
        }

        debug!(path = %name, mode = %info.mode(), "mkdir");
        Ok(())
    }

    /// Create `path` and every missing ancestor. Existing directories are
    /// skipped; an existing file on the way fails with `NotDirectory`.
    pub fn mkdir_all(&self, path: &str, perm: FileMode) -> FsResult<()> {
        let normalized = path::normalize(path);
        let mut current = String::new();

        for component in path::split_components(&normalized) {
            current = path::join(&current, component);

            if self.ctx.dir_exists(&current)? {
                continue;
            }
            if self.ctx.data_exists(&current)? {
                return Err(FsError::not_directory(current));
            }
            match self.mkdir(&current, perm) {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Children of directory `name`, subdirectories first.
    pub fn read_dir(&self, name: &str) -> FsResult<Vec<DirEntry>> {
        let name = path::normalize(name);
        match self.classify(&name)? {
            Some(Kind::Dir) => listing::read_dir_entries(&self.ctx, &name),
            Some(Kind::File) => Err(FsError::not_directory(name)),
            None => Err(FsError::not_exist(name)),
        }
    }

    // ---- Removing ----

    /// Remove a file or a directory.
    ///
    /// Only the entry's own keys are deleted, primary key first. A
    /// directory's children are left alone.
    pub fn remove(&self, name: &str) -> FsResult<()> {
        let name = path::normalize(name);
        Self::not_root(&name, "remove")?;

        let pair = match self.classify(&name)? {
            Some(Kind::Dir) => KeyPair::for_dir(&name),
            Some(Kind::File) => KeyPair::for_file(&name),
            None => return Err(FsError::not_exist(name)),
        };
        self.ctx.sidecar().remove_pair(&pair)?;

        debug!(path = %name, "remove");
        Ok(())
    }

    /// Remove `path` and everything beneath it, records included.
    ///
    /// Every key equal to `path` or under `path/` is deleted, and the same
    /// range in the metadata namespace; the root covers every key. A failed
    /// delete does not stop the sweep. The first failure is returned once
    /// every key has been attempted. A path that does not exist is not an
    /// error.
    pub fn remove_all(&self, path: &str) -> FsResult<()> {
        let path = path::normalize(path);
        let storage = self.ctx.storage();

        let mut keys = if path::is_root(&path) {
            storage.list("")?
        } else {
            let meta_path = sidecar::meta_key(&path);
            let mut keys = keys_in_range(storage, &path)?;
            keys.extend(keys_in_range(storage, &meta_path)?);
            keys
        };
        keys.sort();
        keys.dedup();

        let mut first_error = None;
        let mut removed = 0usize;
        for key in &keys {
            match storage.delete(key) {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "remove_all: delete failed, continuing");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        debug!(path = %path, removed, attempted = keys.len(), "remove_all");
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    // ---- Rename ----

    /// Move a file or directory to `new_path`, replacing a file already
    /// there.
    ///
    /// The primary key moves first, then the record (with its name
    /// rewritten). If the old primary key cannot be deleted, the new one is
    /// deleted again and the error is returned. Only the entry itself moves:
    /// a directory's children keep their keys.
    pub fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        let old_path = path::normalize(old_path);
        let new_path = path::normalize(new_path);
        Self::not_root(&old_path, "rename")?;
        Self::not_root(&new_path, "rename onto")?;

        let Some(kind) = self.classify(&old_path)? else {
            return Err(FsError::not_exist(old_path));
        };
        if old_path == new_path {
            return Ok(());
        }
        match (kind, self.classify(&new_path)?) {
            (Kind::File, Some(Kind::Dir)) => return Err(FsError::is_directory(new_path)),
            (Kind::Dir, Some(Kind::File)) => return Err(FsError::not_directory(new_path)),
            _ => {}
        }

        let sidecar = self.ctx.sidecar();
        let mut info = match sidecar.load(&old_path)? {
            Some(info) => info,
            None => self.synthesize(&old_path, kind)?,
        };
        info.set_name(path::base_name(&new_path));

        let (old_key, new_key, data) = match kind {
            Kind::Dir => (
                marker::marker_key(&old_path),
                marker::marker_key(&new_path),
                Bytes::new(),
            ),
            Kind::File => {
                let data = self.ctx.storage().get(&old_path)?;
                (old_path.clone(), new_path.clone(), data)
            }
        };
        self.move_key(&old_key, &new_key, data)?;

        sidecar.store(&new_path, &info)?;
        sidecar.delete(&old_path)?;

        debug!(from = %old_path, to = %new_path, ?kind, "rename");
        Ok(())
    }

    /// Put `data` at `new_key` and delete `old_key`. If the delete fails,
    /// `new_key` gets back whatever it held before, or is deleted if it was
    /// absent.
    fn move_key(&self, old_key: &str, new_key: &str, data: Bytes) -> FsResult<()> {
        let storage = self.ctx.storage();
        let previous = match storage.get(new_key) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        storage.put(new_key, data)?;
        if let Err(e) = storage.delete(old_key) {
            let rollback = match previous {
                Some(bytes) => storage.put(new_key, bytes),
                None => storage.delete(new_key),
            };
            if let Err(rollback) = rollback {
                warn!(key = %new_key, error = %rollback, "rename rollback failed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    // ---- Attributes ----

    /// Attributes of `name`: the stored record, or defaults derived from
    /// whether a marker or data key exists. An undecodable record counts as
    /// missing.
    pub fn stat(&self, name: &str) -> FsResult<FileInfo> {
        let name = path::normalize(name);
        if let Some(info) = self.ctx.sidecar().load_tolerant(&name)? {
            return Ok(info);
        }
        match self.classify(&name)? {
            Some(kind) => self.synthesize(&name, kind),
            None => Err(FsError::not_exist(name)),
        }
    }

    fn synthesize(&self, name: &str, kind: Kind) -> FsResult<FileInfo> {
        let base = path::base_name(name);
        Ok(match kind {
            Kind::Dir => FileInfo::synthetic_dir(base, self.ctx.config.default_dir_mode),
            Kind::File => {
                let size = self.ctx.storage().get(name)?.len() as i64;
                FileInfo::synthetic_file(base, size, self.ctx.config.default_file_mode)
            }
        })
    }

    /// Replace the mode bits in the record of `name`. Directories keep the
    /// directory bit. Requires an existing record.
    pub fn chmod(&self, name: &str, mode: FileMode) -> FsResult<()> {
        let name = path::normalize(name);
        let sidecar = self.ctx.sidecar();
        let mut info = sidecar.require(&name)?;

        let mode = if info.is_dir() { mode.with_dir() } else { mode };
        info.set_mode(mode);
        sidecar.store(&name, &info)?;

        debug!(path = %name, %mode, "chmod");
        Ok(())
    }

    /// Ownership is not modelled; always fails.
    pub fn chown(&self, _name: &str, _uid: u32, _gid: u32) -> FsResult<()> {
        Err(FsError::Unsupported { op: "chown" })
    }

    /// Set the modification time in the record of `name`. Access times are
    /// not tracked. Requires an existing record.
    pub fn chtimes(&self, name: &str, _atime: DateTime<Utc>, mtime: DateTime<Utc>) -> FsResult<()> {
        let name = path::normalize(name);
        let sidecar = self.ctx.sidecar();
        let mut info = sidecar.require(&name)?;

        info.set_mod_time(mtime);
        sidecar.store(&name, &info)?;

        debug!(path = %name, %mtime, "chtimes");
        Ok(())
    }

    // ---- Convenience ----

    /// Whether `name` is a file or a directory.
    pub fn exists(&self, name: &str) -> FsResult<bool> {
        Ok(self.classify(&path::normalize(name))?.is_some())
    }

    /// Whether `name` is a directory.
    pub fn is_dir(&self, name: &str) -> FsResult<bool> {
        self.ctx.dir_exists(&path::normalize(name))
    }

    /// Whole contents of file `name`.
    pub fn read_file(&self, name: &str) -> FsResult<Vec<u8>> {
        let file = self.open(name)?;
        let data = file.contents()?;
        file.close()?;
        Ok(data)
    }

    /// Replace the contents of `name`, creating it with `perm` if needed.
    pub fn write_file(&self, name: &str, data: &[u8], perm: FileMode) -> FsResult<()> {
        let file = self.open_file(
            name,
            OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            perm,
        )?;
        file.write(data)?;
        file.close()
    }
}

/// Keys equal to `path` or below `path/`.
fn keys_in_range(storage: &dyn Storage, path: &str) -> FsResult<Vec<String>> {
    let below = format!("{path}/");
    Ok(storage
        .list(path)?
        .into_iter()
        .filter(|key| key == path || key.starts_with(&below))
        .collect())
}
