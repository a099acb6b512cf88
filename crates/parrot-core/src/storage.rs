//! Persistent local caches backed by JSON files.
//!
//! This module provides the two stores the agent keeps on disk:
//! - Address book (contacts keyed by identity)
//! - Group directory (groups keyed by creator + group id)
//!
//! Both are in-memory maps behind a single mutex with a JSON file behind
//! them. Every mutation marks the map dirty; `persist` writes the whole map
//! atomically (temp file + rename) and clears the flag. A failed save keeps
//! the flag set so the next mutation or `flush` retries it.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AgentError, AgentResult};

mod contacts;
mod groups;

pub use contacts::ContactStore;
pub use groups::GroupStore;

struct Inner<K, V> {
    records: BTreeMap<K, V>,
    dirty: bool,
}

/// Map of records mirrored to a JSON file
pub(crate) struct FileBacked<K, V> {
    path: PathBuf,
    inner: Mutex<Inner<K, V>>,
    saves: AtomicU64,
}

impl<K, V> FileBacked<K, V>
where
    K: Ord + Clone,
    V: Clone + Serialize + DeserializeOwned,
{
    /// Load records from `path`, or start empty if the file does not exist.
    pub(crate) fn load(path: impl AsRef<Path>, key_of: impl Fn(&V) -> K) -> AgentResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut records = BTreeMap::new();

        match fs::read(&path) {
            Ok(bytes) => {
                let list: Vec<V> = serde_json::from_slice(&bytes)?;
                for record in list {
                    records.insert(key_of(&record), record);
                }
                debug!(path = %path.display(), count = records.len(), "Loaded store");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No store file yet, starting empty");
            }
            Err(e) => return Err(AgentError::Io(e)),
        }

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                records,
                dirty: false,
            }),
            saves: AtomicU64::new(0),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().records.get(key).cloned()
    }

    /// Replace the record at `key` with `f(previous)` and mark the map dirty.
    pub(crate) fn update(&self, key: K, f: impl FnOnce(Option<V>) -> V) -> V {
        let mut inner = self.inner.lock();
        let previous = inner.records.remove(&key);
        let next = f(previous);
        inner.records.insert(key, next.clone());
        inner.dirty = true;
        next
    }

    pub(crate) fn values(&self) -> Vec<V> {
        self.inner.lock().records.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    pub(crate) fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Write the whole map to disk.
    ///
    /// The lock is held across the write so saves land in mutation order.
    pub(crate) fn persist(&self) -> AgentResult<()> {
        let mut inner = self.inner.lock();
        let count = inner.records.len();
        let data = {
            let list: Vec<&V> = inner.records.values().collect();
            serde_json::to_vec_pretty(&list)?
        };

        match atomic_write(&self.path, &data) {
            Ok(()) => {
                inner.dirty = false;
                self.saves.fetch_add(1, Ordering::Relaxed);
                debug!(path = %self.path.display(), count, "Saved store");
                Ok(())
            }
            Err(source) => {
                inner.dirty = true;
                warn!(path = %self.path.display(), error = %source, "Saving store failed");
                Err(AgentError::Persistence {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    /// Persist only if there are unsaved changes. Returns whether a save ran.
    pub(crate) fn flush(&self) -> AgentResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.persist().map(|()| true)
    }
}

/// Atomic file write (write to temp, then rename)
///
/// Either the old content remains or the new content is fully written.
/// The temp file is synced before the rename so a crash cannot leave a
/// renamed but empty file behind.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;

    Ok(())
}
