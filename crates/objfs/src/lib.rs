//! POSIX-like filesystem semantics over flat object storage.
//!
//! An object store only knows keys and blobs. This crate layers files and
//! directories on top of any [`objfs_storage::Storage`] backend:
//!
//! - **Paths** are normalized into canonical keys (see [`path`]).
//! - **Directories** exist only as zero-byte marker objects at
//!   `<path>/.dir`; the marker is the sole authority for directory-ness.
//! - **Attributes** (size, mode, modification time) live in a JSON sidecar
//!   record at `.meta/<path>`, written and deleted alongside the primary key.
//! - **Open files** are in-memory buffers: a [`StorageFile`] loads the whole
//!   object on open and writes it back on `sync`/`close`.
//!
//! # Modules
//!
//! - [`error`] -- [`FsError`] and the [`FsResult`] alias
//! - [`path`] -- path normalization and component helpers
//! - [`mode`] -- [`FileMode`] bits and [`OpenFlags`]
//! - [`info`] -- [`FileInfo`] records and [`DirEntry`] views
//! - [`sidecar`] -- metadata key layout and the paired-key lifecycle
//! - [`marker`] -- directory marker protocol
//! - [`buffer`] -- the splice/pad byte buffer behind open files
//! - [`listing`] -- directory enumeration from delimiter-aware listings
//! - [`file`] -- the [`StorageFile`] handle
//! - [`fs`] -- the [`StorageFs`] façade
//! - [`traits`] -- the [`Fs`] and [`File`] capabilities
//! - [`config`] -- [`FsConfig`]
//!
//! # Consistency
//!
//! Nothing here is transactional. Multi-key operations (rename, recursive
//! remove, mkdir) are ordered sequences of single-key calls, and each
//! documents what a failure at every step leaves behind. Independent handles
//! on the same path are not coordinated: the last `sync`/`close` wins.

pub mod buffer;
pub mod config;
mod context;
pub mod error;
pub mod file;
pub mod fs;
pub mod info;
pub mod listing;
pub mod marker;
pub mod mode;
pub mod path;
pub mod sidecar;
pub mod traits;

pub use buffer::ContentBuffer;
pub use config::FsConfig;
pub use error::{FsError, FsResult};
pub use file::{seek_from_whence, StorageFile};
pub use fs::StorageFs;
pub use info::{DirEntry, FileInfo};
pub use mode::{FileMode, OpenFlags};
pub use traits::{File, Fs};
