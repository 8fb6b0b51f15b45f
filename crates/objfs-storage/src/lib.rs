//! Flat key-value object storage for objfs.
//!
//! This crate defines the boundary between the objfs filesystem layer and
//! whatever actually holds the bytes. A backend offers only flat keys:
//! put a blob, get it back, delete it, and list keys by prefix. Anything
//! that looks like a directory is a convention layered on top.
//!
//! # Capabilities
//!
//! - [`Storage`] -- the minimal contract every backend implements
//! - [`DelimitedList`] -- optional hierarchical listing (prefix + delimiter,
//!   paginated), resolved by the caller when it is constructed
//!
//! # Backends
//!
//! - [`InMemoryStorage`] -- `BTreeMap`-based store for tests and embedding,
//!   with fault injection for exercising partial failures
//! - [`LocalStorage`] -- one file per key under a root directory
//!
//! # Design Rules
//!
//! 1. Keys are opaque strings; `/` has no meaning to [`Storage`] itself.
//! 2. A missing key is always reported as [`StorageError::NotFound`].
//! 3. Objects are whole blobs: a put replaces, a get returns everything.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod list;
pub mod local;
pub mod memory;
pub mod traits;
pub mod validation;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StorageError, StorageResult};
pub use list::{ListOptions, ListResult, ObjectInfo, ObjectMeta};
pub use local::{LocalStorage, LocalStorageConfig};
pub use memory::{FaultOp, InMemoryStorage};
pub use traits::{DelimitedList, Storage};
pub use validation::{validate_key, MAX_KEY_LENGTH};
