//! Shared state behind a [`StorageFs`](crate::StorageFs) and its handles.

use std::sync::Arc;

use objfs_storage::{DelimitedList, Storage};

use crate::config::FsConfig;
use crate::error::FsResult;
use crate::marker;
use crate::path;
use crate::sidecar::Sidecar;

/// Backend plus capabilities, resolved once at construction.
pub(crate) struct FsContext {
    pub(crate) storage: Arc<dyn Storage>,
    /// `None` when the backend cannot list hierarchically.
    pub(crate) lister: Option<Arc<dyn DelimitedList>>,
    pub(crate) config: FsConfig,
}

impl FsContext {
    pub(crate) fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub(crate) fn sidecar(&self) -> Sidecar<'_> {
        Sidecar::new(self.storage.as_ref())
    }

    /// The root always counts as a directory, marker or not.
    pub(crate) fn dir_exists(&self, path: &str) -> FsResult<bool> {
        if path::is_root(path) {
            return Ok(true);
        }
        marker::exists(self.storage(), path)
    }

    /// The data key exists. Callers check for a directory marker first.
    pub(crate) fn data_exists(&self, path: &str) -> FsResult<bool> {
        Ok(self.storage.exists(path)?)
    }
}

impl std::fmt::Debug for FsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsContext")
            .field("has_lister", &self.lister.is_some())
            .field("config", &self.config)
            .finish()
    }
}
