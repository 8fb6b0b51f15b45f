//! The [`Fs`] and [`File`] traits.
//!
//! Code that only needs filesystem behavior can be written against these
//! traits instead of [`StorageFs`] and [`StorageFile`] directly.

use std::io::SeekFrom;

use chrono::{DateTime, Utc};

use crate::error::FsResult;
use crate::file::StorageFile;
use crate::fs::StorageFs;
use crate::info::FileInfo;
use crate::mode::{FileMode, OpenFlags};

/// An open file or directory.
///
/// Implementations must be thread-safe (`Send + Sync`): a handle may be
/// shared, and each call is applied atomically with respect to the others.
pub trait File: Send + Sync {
    /// Write back pending changes and release the handle.
    fn close(&self) -> FsResult<()>;

    /// Read from the cursor. `Ok(0)` means end of file.
    fn read(&self, buf: &mut [u8]) -> FsResult<usize>;

    /// Read at an absolute offset without moving the cursor.
    fn read_at(&self, buf: &mut [u8], offset: i64) -> FsResult<usize>;

    /// Write at the cursor.
    fn write(&self, data: &[u8]) -> FsResult<usize>;

    /// Write at an absolute offset without moving the cursor.
    fn write_at(&self, data: &[u8], offset: i64) -> FsResult<usize>;

    /// Move the cursor; returns the new absolute position.
    fn seek(&self, pos: SeekFrom) -> FsResult<u64>;

    /// Path the handle was opened with.
    fn name(&self) -> &str;

    fn stat(&self) -> FsResult<FileInfo>;

    /// Write back pending changes.
    fn sync(&self) -> FsResult<()>;

    /// Resize to exactly `size` bytes.
    fn truncate(&self, size: i64) -> FsResult<()>;

    fn write_string(&self, s: &str) -> FsResult<usize> {
        self.write(s.as_bytes())
    }

    /// Next directory entries; `count <= 0` returns all that remain.
    fn readdir(&self, count: isize) -> FsResult<Vec<FileInfo>>;

    /// Next directory entry names; `count <= 0` returns all that remain.
    fn readdir_names(&self, count: isize) -> FsResult<Vec<String>> {
        Ok(self
            .readdir(count)?
            .into_iter()
            .map(|info| info.name().to_string())
            .collect())
    }
}

/// A filesystem.
pub trait Fs: Send + Sync {
    type File: File;

    /// Identifier of the filesystem implementation.
    fn name(&self) -> &str;

    /// Create or truncate a file for reading and writing.
    fn create(&self, name: &str) -> FsResult<Self::File>;

    fn mkdir(&self, name: &str, perm: FileMode) -> FsResult<()>;

    /// Create a directory and any missing ancestors.
    fn mkdir_all(&self, path: &str, perm: FileMode) -> FsResult<()>;

    /// Open read-only.
    fn open(&self, name: &str) -> FsResult<Self::File>;

    fn open_file(&self, name: &str, flags: OpenFlags, perm: FileMode) -> FsResult<Self::File>;

    fn remove(&self, name: &str) -> FsResult<()>;

    /// Remove a path and everything beneath it.
    fn remove_all(&self, path: &str) -> FsResult<()>;

    fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()>;

    fn stat(&self, name: &str) -> FsResult<FileInfo>;

    fn chmod(&self, name: &str, mode: FileMode) -> FsResult<()>;

    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()>;

    fn chtimes(&self, name: &str, atime: DateTime<Utc>, mtime: DateTime<Utc>) -> FsResult<()>;
}

impl File for StorageFile {
    fn close(&self) -> FsResult<()> {
        StorageFile::close(self)
    }

    fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        StorageFile::read(self, buf)
    }

    fn read_at(&self, buf: &mut [u8], offset: i64) -> FsResult<usize> {
        StorageFile::read_at(self, buf, offset)
    }

    fn write(&self, data: &[u8]) -> FsResult<usize> {
        StorageFile::write(self, data)
    }

    fn write_at(&self, data: &[u8], offset: i64) -> FsResult<usize> {
        StorageFile::write_at(self, data, offset)
    }

    fn seek(&self, pos: SeekFrom) -> FsResult<u64> {
        StorageFile::seek(self, pos)
    }

    fn name(&self) -> &str {
        StorageFile::name(self)
    }

    fn stat(&self) -> FsResult<FileInfo> {
        StorageFile::stat(self)
    }

    fn sync(&self) -> FsResult<()> {
        StorageFile::sync(self)
    }

    fn truncate(&self, size: i64) -> FsResult<()> {
        StorageFile::truncate(self, size)
    }

    fn readdir(&self, count: isize) -> FsResult<Vec<FileInfo>> {
        StorageFile::readdir(self, count)
    }
}

impl Fs for StorageFs {
    type File = StorageFile;

    fn name(&self) -> &str {
        StorageFs::name(self)
    }

    fn create(&self, name: &str) -> FsResult<StorageFile> {
        StorageFs::create(self, name)
    }

    fn mkdir(&self, name: &str, perm: FileMode) -> FsResult<()> {
        StorageFs::mkdir(self, name, perm)
    }

    fn mkdir_all(&self, path: &str, perm: FileMode) -> FsResult<()> {
        StorageFs::mkdir_all(self, path, perm)
    }

    fn open(&self, name: &str) -> FsResult<StorageFile> {
        StorageFs::open(self, name)
    }

    fn open_file(&self, name: &str, flags: OpenFlags, perm: FileMode) -> FsResult<StorageFile> {
        StorageFs::open_file(self, name, flags, perm)
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        StorageFs::remove(self, name)
    }

    fn remove_all(&self, path: &str) -> FsResult<()> {
        StorageFs::remove_all(self, path)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        StorageFs::rename(self, old_path, new_path)
    }

    fn stat(&self, name: &str) -> FsResult<FileInfo> {
        StorageFs::stat(self, name)
    }

    fn chmod(&self, name: &str, mode: FileMode) -> FsResult<()> {
        StorageFs::chmod(self, name, mode)
    }

    fn chown(&self, name: &str, uid: u32, gid: u32) -> FsResult<()> {
        StorageFs::chown(self, name, uid, gid)
    }

    fn chtimes(&self, name: &str, atime: DateTime<Utc>, mtime: DateTime<Utc>) -> FsResult<()> {
        StorageFs::chtimes(self, name, atime, mtime)
    }
}
