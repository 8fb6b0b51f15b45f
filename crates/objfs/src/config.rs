use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::mode::FileMode;

/// Configuration for a [`StorageFs`](crate::StorageFs).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Identifier returned by `name()`.
    pub name: String,
    /// Permission bits reported for files that have no metadata record.
    pub default_file_mode: FileMode,
    /// Permission bits reported for directories that have no metadata record.
    pub default_dir_mode: FileMode,
    /// Permission bits `create()` opens new files with.
    pub create_mode: FileMode,
    /// Page size for directory listings; `0` lets the backend decide.
    pub list_page_size: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            name: "StorageFS".to_string(),
            default_file_mode: FileMode::from_bits(0o644),
            default_dir_mode: FileMode::from_bits(0o755),
            create_mode: FileMode::from_bits(0o666),
            list_page_size: 0,
        }
    }
}

impl FsConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> FsResult<Self> {
        toml::from_str(s).map_err(|e| FsError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> FsResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> FsResult<String> {
        toml::to_string(self).map_err(|e| FsError::Config(e.to_string()))
    }
}
