//! Object key validation.
//!
//! Backends that map keys onto something with its own path semantics (a
//! local directory tree, for instance) must not let a key escape their
//! root. Valid keys:
//! - Are non-empty and at most [`MAX_KEY_LENGTH`] bytes
//! - Contain no NUL, newline, carriage return or tab
//! - Are not absolute (`/x`, `\x`, `C:...`)
//! - Contain no `..` path component
//! - Contain no `//` or `\\`

use crate::error::{StorageError, StorageResult};

/// Maximum allowed length of an object key, in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Characters that are forbidden anywhere in a key.
const FORBIDDEN_CHARS: &[char] = &['\0', '\n', '\r', '\t'];

fn invalid(key: &str, reason: impl Into<String>) -> StorageError {
    StorageError::InvalidKey {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Validate an object key, returning `Ok(())` if it is safe to store.
///
/// # Examples
///
/// ```
/// use objfs_storage::validate_key;
///
/// assert!(validate_key("docs/readme.txt").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("../etc/passwd").is_err());
/// ```
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(invalid(key, "key cannot be empty"));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(invalid(
            key,
            format!("key length exceeds maximum of {MAX_KEY_LENGTH} bytes"),
        ));
    }

    for ch in FORBIDDEN_CHARS {
        if key.contains(*ch) {
            return Err(invalid(key, format!("contains forbidden character: {ch:?}")));
        }
    }

    if key.starts_with('/') || key.starts_with('\\') {
        return Err(invalid(key, "key cannot be an absolute path"));
    }

    // Windows drive prefix (C:\, D:...).
    if key.as_bytes().get(1) == Some(&b':') {
        return Err(invalid(key, "key cannot be an absolute path"));
    }

    if key.contains("//") || key.contains("\\\\") {
        return Err(invalid(key, "key contains an empty path component"));
    }

    if key.split(['/', '\\']).any(|component| component == "..") {
        return Err(invalid(key, "key cannot contain path traversal sequences (..)"));
    }

    Ok(())
}
