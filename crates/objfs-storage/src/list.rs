//! Listing request and response types for [`DelimitedList`](crate::DelimitedList).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options for a hierarchical, paginated listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Groups keys sharing the text up to the next delimiter after the
    /// prefix into [`ListResult::common_prefixes`]. Empty disables grouping.
    pub delimiter: String,
    /// Maximum number of objects plus common prefixes per page.
    /// `0` means the backend default (unbounded for the bundled backends).
    pub max_results: usize,
    /// Continuation token from a previous [`ListResult::next_token`].
    pub continue_from: Option<String>,
}

impl ListOptions {
    /// List everything under `prefix`, grouped by `delimiter`.
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
            ..Default::default()
        }
    }

    /// Limit the page size.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Resume from a continuation token.
    pub fn continue_from(mut self, token: Option<String>) -> Self {
        self.continue_from = token;
        self
    }
}

/// Backend-reported attributes of a listed object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: i64,
    /// Last modification time, when the backend tracks one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// One object in a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub meta: Option<ObjectMeta>,
}

/// One page of a hierarchical listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListResult {
    /// Objects directly under the prefix (no delimiter after it).
    pub objects: Vec<ObjectInfo>,
    /// Grouping keys, each ending with the delimiter, e.g. `a/b/` under `a/`.
    pub common_prefixes: Vec<String>,
    /// Token for the next page; `None` when this is the last page.
    pub next_token: Option<String>,
    /// Whether more results are available.
    pub truncated: bool,
}

impl ListResult {
    /// Returns `true` if the page holds neither objects nor prefixes.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }
}

/// Group a sorted key stream into a [`ListResult`] page.
///
/// Shared by the bundled backends, which can all produce their keys in
/// sorted order. The continuation token is the last key or common prefix
/// emitted; entries at or before it are skipped on the next call.
pub(crate) fn paginate<I>(keys: I, opts: &ListOptions) -> ListResult
where
    I: IntoIterator<Item = (String, Option<ObjectMeta>)>,
{
    let mut result = ListResult::default();
    let mut emitted = 0usize;
    let mut last_emitted: Option<String> = None;

    for (key, meta) in keys {
        let Some(rel) = key.strip_prefix(opts.prefix.as_str()) else {
            continue;
        };

        // Collapse to a common prefix when the delimiter appears after the prefix.
        let entry = match (!opts.delimiter.is_empty())
            .then(|| rel.find(opts.delimiter.as_str()))
            .flatten()
        {
            Some(idx) => {
                let common = format!("{}{}", opts.prefix, &rel[..idx + opts.delimiter.len()]);
                Entry::Prefix(common)
            }
            None if rel.is_empty() && !opts.delimiter.is_empty() => continue,
            None => Entry::Object(ObjectInfo { key, meta }),
        };

        let marker = entry.marker().to_string();
        if let Some(token) = &opts.continue_from {
            if marker.as_str() <= token.as_str() {
                continue;
            }
        }
        if last_emitted.as_deref() == Some(marker.as_str()) {
            continue;
        }

        if opts.max_results > 0 && emitted == opts.max_results {
            result.truncated = true;
            result.next_token = last_emitted;
            return result;
        }

        match entry {
            Entry::Prefix(p) => result.common_prefixes.push(p),
            Entry::Object(o) => result.objects.push(o),
        }
        emitted += 1;
        last_emitted = Some(marker);
    }

    result
}

enum Entry {
    Prefix(String),
    Object(ObjectInfo),
}

impl Entry {
    fn marker(&self) -> &str {
        match self {
            Entry::Prefix(p) => p,
            Entry::Object(o) => &o.key,
        }
    }
}
