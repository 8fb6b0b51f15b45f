use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{StorageError, StorageResult};
use crate::list::{paginate, ListOptions, ListResult, ObjectMeta};
use crate::traits::{DelimitedList, Storage};

/// Storage operation targeted by an injected fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Put,
    Get,
    Delete,
    List,
}

#[derive(Debug)]
struct Fault {
    op: FaultOp,
    /// `None` matches every key.
    key: Option<String>,
    /// Remaining hits before the fault disarms; `None` never disarms.
    remaining: Option<usize>,
}

#[derive(Clone, Debug)]
struct Object {
    data: Bytes,
    modified: DateTime<Utc>,
}

/// In-memory, `BTreeMap`-based object store.
///
/// Intended for tests and embedding. Keys are kept sorted, which makes
/// hierarchical listing a single ordered scan. Failures can be injected per
/// operation and key to exercise callers' partial-failure paths.
pub struct InMemoryStorage {
    objects: RwLock<BTreeMap<String, Object>>,
    faults: Mutex<Vec<Fault>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Backend(format!("lock poisoned: {e}"))
}

impl InMemoryStorage {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a sorted list of all keys in the store.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `key` is present, bypassing injected faults.
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .map(|m| m.contains_key(key))
            .unwrap_or(false)
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        if let Ok(mut map) = self.objects.write() {
            map.clear();
        }
    }

    /// Make the next `op` on `key` fail once.
    pub fn fail_next(&self, op: FaultOp, key: impl Into<String>) {
        self.inject(Fault {
            op,
            key: Some(key.into()),
            remaining: Some(1),
        });
    }

    /// Make every `op` on `key` fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_always(&self, op: FaultOp, key: impl Into<String>) {
        self.inject(Fault {
            op,
            key: Some(key.into()),
            remaining: None,
        });
    }

    /// Make every `op` fail, whatever the key.
    pub fn fail_all(&self, op: FaultOp) {
        self.inject(Fault {
            op,
            key: None,
            remaining: None,
        });
    }

    /// Disarm all injected faults.
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    fn inject(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault);
        }
    }

    fn check_fault(&self, op: FaultOp, key: &str) -> StorageResult<()> {
        let mut faults = self.faults.lock().map_err(poisoned)?;
        let hit = faults.iter().position(|f| {
            f.op == op && f.key.as_deref().map_or(true, |k| k == key)
        });
        let Some(idx) = hit else {
            return Ok(());
        };
        if let Some(remaining) = faults[idx].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.remove(idx);
            }
        }
        Err(StorageError::Backend(format!("injected {op:?} failure for {key:?}")))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.check_fault(FaultOp::Put, key)?;
        let mut map = self.objects.write().map_err(poisoned)?;
        map.insert(
            key.to_string(),
            Object {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.check_fault(FaultOp::Get, key)?;
        let map = self.objects.read().map_err(poisoned)?;
        map.get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.check_fault(FaultOp::Delete, key)?;
        let mut map = self.objects.write().map_err(poisoned)?;
        map.remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.check_fault(FaultOp::List, prefix)?;
        let map = self.objects.read().map_err(poisoned)?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        self.check_fault(FaultOp::Get, key)?;
        let map = self.objects.read().map_err(poisoned)?;
        Ok(map.contains_key(key))
    }
}

impl DelimitedList for InMemoryStorage {
    fn list_with_options(&self, opts: &ListOptions) -> StorageResult<ListResult> {
        self.check_fault(FaultOp::List, &opts.prefix)?;
        let map = self.objects.read().map_err(poisoned)?;
        let keys = map
            .range(opts.prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(opts.prefix.as_str()))
            .map(|(k, obj)| {
                let meta = ObjectMeta {
                    size: obj.data.len() as i64,
                    last_modified: Some(obj.modified),
                };
                (k.clone(), Some(meta))
            });
        Ok(paginate(keys, opts))
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("object_count", &self.len())
            .finish()
    }
}
