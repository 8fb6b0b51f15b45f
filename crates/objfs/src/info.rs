//! File attribute records and directory entries.
//!
//! [`FileInfo`] is both what `stat` returns and what the metadata sidecar
//! stores. Its JSON form is
//! `{"name","size","mode","modTime","isDir"}` with `modTime` in RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::mode::FileMode;

/// Attributes of a file or directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    name: String,
    size: i64,
    mode: FileMode,
    mod_time: DateTime<Utc>,
    is_dir: bool,
}

impl FileInfo {
    pub fn new(
        name: impl Into<String>,
        size: i64,
        mode: FileMode,
        mod_time: DateTime<Utc>,
        is_dir: bool,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            mode,
            mod_time,
            is_dir,
        }
    }

    /// Default attributes for a directory with no stored record.
    pub fn synthetic_dir(name: impl Into<String>, perm: FileMode) -> Self {
        Self::new(name, 0, FileMode::DIR | perm, Utc::now(), true)
    }

    /// Default attributes for a file with no stored record.
    pub fn synthetic_file(name: impl Into<String>, size: i64, perm: FileMode) -> Self {
        Self::new(name, size, perm, Utc::now(), false)
    }

    /// Base name of the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in bytes; `0` for directories.
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_size(&mut self, size: i64) {
        self.size = size;
    }

    pub(crate) fn set_mode(&mut self, mode: FileMode) {
        self.mode = mode;
    }

    pub(crate) fn set_mod_time(&mut self, mod_time: DateTime<Utc>) {
        self.mod_time = mod_time;
    }

    /// Encode as the sidecar JSON record.
    pub fn to_json(&self) -> FsResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a sidecar JSON record.
    pub fn from_json(data: &[u8]) -> FsResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    info: FileInfo,
}

impl DirEntry {
    pub fn new(info: FileInfo) -> Self {
        Self { info }
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn is_dir(&self) -> bool {
        self.info.is_dir()
    }

    /// The type bits of the entry's mode.
    pub fn file_type(&self) -> FileMode {
        self.info.mode().file_type()
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn into_info(self) -> FileInfo {
        self.info
    }
}
