//! Path normalization into the storage key namespace.
//!
//! Every path handed to the filesystem is canonicalized before it becomes a
//! key:
//! - Empty and `/` both mean the root, spelled `.`
//! - Backslashes become forward slashes
//! - Repeated separators and `.` segments collapse; `..` resolves lexically
//! - The leading slash is stripped, so keys are always relative
//!
//! The directory marker decides what is a directory. [`looks_like_dir`] is
//! only a naming hint.

/// The canonical spelling of the root directory.
pub const ROOT: &str = ".";

/// Path separator used in keys.
pub const SEPARATOR: char = '/';

/// Lexically clean a slash-separated path.
///
/// Follows the usual rules: collapse repeated slashes, drop `.` elements,
/// remove each `..` together with the element before it, and drop `..`
/// elements that would climb above a rooted path.
fn clean(path: &str) -> String {
    let rooted = path.starts_with(SEPARATOR);
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|last| *last != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }

    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ROOT.to_string(),
        (false, false) => joined,
    }
}

/// Canonicalize `raw` into a storage key.
///
/// # Examples
///
/// ```
/// use objfs::path::normalize;
///
/// assert_eq!(normalize(""), ".");
/// assert_eq!(normalize("/a//b/./c/"), "a/b/c");
/// assert_eq!(normalize("a\\b\\..\\c"), "a/c");
/// ```
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() || raw == "/" {
        return ROOT.to_string();
    }

    let slashed = raw.replace('\\', "/");
    let cleaned = clean(&slashed);
    let relative = cleaned.trim_start_matches(SEPARATOR);

    if relative.is_empty() {
        ROOT.to_string()
    } else {
        relative.to_string()
    }
}

/// Returns `true` if `path` is the root.
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// The ordered components of `path`, skipping empty and `.` segments.
///
/// `split_components("a/b/c")` yields `["a", "b", "c"]`; the root yields
/// nothing.
pub fn split_components(path: &str) -> Vec<&str> {
    path.split(SEPARATOR)
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// Naming heuristic: root or a trailing slash.
pub fn looks_like_dir(path: &str) -> bool {
    path.is_empty() || path == ROOT || path == "/" || path.ends_with(SEPARATOR)
}

/// The final component of a normalized path; the root's base name is `.`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return ROOT;
    }
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// The parent of a normalized path; the root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[..idx],
        None => ROOT,
    }
}

/// Join a normalized directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if is_root(dir) || dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}{SEPARATOR}{name}")
    }
}
