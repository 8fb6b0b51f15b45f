//! Directory enumeration.
//!
//! A directory's children are found with a delimiter-aware listing of the
//! prefix `<dir>/` (empty for the root):
//!
//! - each common prefix `<dir>/<child>/` is a subdirectory,
//! - each object `<dir>/<child>` is a file, unless it is a marker, lives in
//!   the metadata namespace, or is not a direct child,
//! - names are deduplicated, subdirectories first.
//!
//! Attributes come from each child's metadata record when there is one and
//! are synthesized otherwise.

use std::collections::HashSet;

use chrono::Utc;
use objfs_storage::{ListOptions, ObjectInfo};
use tracing::trace;

use crate::context::FsContext;
use crate::error::FsResult;
use crate::info::{DirEntry, FileInfo};
use crate::marker;
use crate::path::{self, SEPARATOR};
use crate::sidecar::{self, META_PREFIX};

const DELIMITER: &str = "/";

/// The listing prefix for a directory: `<dir>/`, or empty for the root.
pub fn dir_prefix(dir: &str) -> String {
    let dir = path::normalize(dir);
    if path::is_root(&dir) {
        String::new()
    } else {
        format!("{dir}{SEPARATOR}")
    }
}

/// List the direct children of `dir`.
///
/// Without the hierarchical listing capability the result is empty.
pub(crate) fn read_dir_entries(ctx: &FsContext, dir: &str) -> FsResult<Vec<DirEntry>> {
    let Some(lister) = ctx.lister.as_deref() else {
        return Ok(Vec::new());
    };

    let prefix = dir_prefix(dir);
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    let mut token = None;
    loop {
        let opts = ListOptions::new(prefix.clone(), DELIMITER)
            .with_max_results(ctx.config.list_page_size)
            .continue_from(token.take());
        let page = lister.list_with_options(&opts)?;

        for common in &page.common_prefixes {
            if let Some(entry) = dir_entry(ctx, common, &mut seen)? {
                dirs.push(entry);
            }
        }
        for object in &page.objects {
            if let Some(entry) = file_entry(ctx, &prefix, object, &mut seen)? {
                files.push(entry);
            }
        }

        match page.next_token {
            Some(next) if page.truncated => token = Some(next),
            _ => break,
        }
    }

    trace!(dir, dirs = dirs.len(), files = files.len(), "listed directory");
    dirs.extend(files);
    Ok(dirs)
}

fn dir_entry(
    ctx: &FsContext,
    common_prefix: &str,
    seen: &mut HashSet<String>,
) -> FsResult<Option<DirEntry>> {
    if common_prefix == META_PREFIX {
        return Ok(None);
    }
    let dir_path = common_prefix.trim_end_matches(SEPARATOR);
    if dir_path.is_empty() {
        return Ok(None);
    }
    let name = path::base_name(dir_path);
    if !seen.insert(name.to_string()) {
        return Ok(None);
    }

    let info = match ctx.sidecar().load_tolerant(dir_path)? {
        Some(record) => {
            FileInfo::new(name, record.size(), record.mode(), record.mod_time(), true)
        }
        None => FileInfo::synthetic_dir(name, ctx.config.default_dir_mode),
    };
    Ok(Some(DirEntry::new(info)))
}

fn file_entry(
    ctx: &FsContext,
    prefix: &str,
    object: &ObjectInfo,
    seen: &mut HashSet<String>,
) -> FsResult<Option<DirEntry>> {
    let key = object.key.as_str();
    if sidecar::is_meta_key(key) || marker::is_marker_key(key) {
        return Ok(None);
    }
    let rel = key.strip_prefix(prefix).unwrap_or(key);
    if rel.is_empty() || rel.contains(SEPARATOR) {
        return Ok(None);
    }
    let name = path::base_name(key);
    if !seen.insert(name.to_string()) {
        return Ok(None);
    }

    let info = match ctx.sidecar().load_tolerant(key)? {
        Some(record) => {
            FileInfo::new(name, record.size(), record.mode(), record.mod_time(), false)
        }
        None => {
            let (size, mod_time) = object
                .meta
                .as_ref()
                .map(|m| (m.size, m.last_modified.unwrap_or_else(Utc::now)))
                .unwrap_or_else(|| (0, Utc::now()));
            FileInfo::new(name, size, ctx.config.default_file_mode, mod_time, false)
        }
    };
    Ok(Some(DirEntry::new(info)))
}
