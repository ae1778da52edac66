#![forbid(unsafe_code)]

//! JSON-file store for cross-session persistence.
//!
//! The whole store is one JSON document:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "entries": {
//!     "flag":   { "type": "bool",   "value": true },
//!     "origin": { "type": "data",   "value": "eyJ4IjowLCJ5IjowfQ==" }
//!   }
//! }
//! ```
//!
//! Byte blobs are base64 (standard alphabet, padded). Every write rewrites
//! the document to a sibling temp file and renames it over the original, so
//! a crash mid-write leaves the previous document intact.
//!
//! # Invariants
//!
//! 1. The in-memory map only changes after the document hit the disk.
//! 2. Watchers run after the map is updated, never while it is borrowed.
//! 3. [`FileStore::reload`] notifies exactly the keys whose value changed.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Missing file | First run | Empty store; file created on first write |
//! | Corrupt file on open | Hand edit, truncation | `StoreError::Format` |
//! | Corrupt file on reload | Concurrent partial write | `StoreError::Format`, previous contents kept |
//! | Non-finite float | JSON cannot represent it | `StoreError::Format`, nothing written |
//! | Write failure | Permissions, full disk | `StoreError::Io`, map unchanged |

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::{ChangeCallback, Store, WatchHandle, Watchers, deliver};
use crate::error::StoreError;
use crate::value::RawValue;

const FORMAT_VERSION: u32 = 1;

/// Configuration for a [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Location of the JSON document.
    pub path: PathBuf,
    /// Create missing parent directories on first write.
    pub create_dirs: bool,
    /// Pretty-print the document.
    pub pretty: bool,
}

impl FileStoreConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_dirs: true,
            pretty: true,
        }
    }

    #[must_use]
    pub fn with_create_dirs(mut self, enabled: bool) -> Self {
        self.create_dirs = enabled;
        self
    }

    #[must_use]
    pub fn with_pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    format_version: u32,
    #[serde(default)]
    entries: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
enum FileEntry {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Data(String),
}

impl FileEntry {
    fn from_raw(value: &RawValue) -> Self {
        match value {
            RawValue::Bool(b) => Self::Bool(*b),
            RawValue::Int(i) => Self::Int(*i),
            RawValue::Float(f) => Self::Float(*f),
            RawValue::String(s) => Self::String(s.clone()),
            RawValue::Data(d) => Self::Data(STANDARD.encode(d)),
        }
    }

    fn into_raw(self, key: &str) -> Result<RawValue, StoreError> {
        Ok(match self {
            Self::Bool(b) => RawValue::Bool(b),
            Self::Int(i) => RawValue::Int(i),
            Self::Float(f) => RawValue::Float(f),
            Self::String(s) => RawValue::String(s),
            Self::Data(d) => RawValue::Data(STANDARD.decode(d).map_err(|err| {
                StoreError::Format(format!("entry '{key}' is not valid base64: {err}"))
            })?),
        })
    }
}

struct FileInner {
    config: FileStoreConfig,
    entries: RefCell<BTreeMap<String, RawValue>>,
    watchers: RefCell<Watchers>,
}

/// Store persisted as a single JSON document.
///
/// Clones share state. Two `FileStore`s opened on the same path do not: each
/// sees the other's writes only after [`reload`](Self::reload).
#[derive(Clone)]
pub struct FileStore {
    inner: Rc<FileInner>,
}

impl FileStore {
    /// Open the document at `config.path`. A missing file is an empty store.
    pub fn open(config: FileStoreConfig) -> Result<Self, StoreError> {
        let entries = read_document(&config.path)?;
        tracing::debug!(
            path = %config.path.display(),
            entries = entries.len(),
            "file store opened"
        );
        Ok(Self {
            inner: Rc::new(FileInner {
                config,
                entries: RefCell::new(entries),
                watchers: RefCell::new(Watchers::default()),
            }),
        })
    }

    /// Shorthand for [`open`](Self::open) with default config.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(FileStoreConfig::new(path))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.config.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Number of live registrations on `key`.
    #[must_use]
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner.watchers.borrow().count(key)
    }

    /// Re-read the document and notify watchers of every key whose value
    /// changed, was added, or was removed since the last read or write.
    ///
    /// Returns the number of changed keys. On error the store keeps its
    /// previous contents.
    pub fn reload(&self) -> Result<usize, StoreError> {
        let fresh = read_document(&self.inner.config.path)?;
        let old = self.inner.entries.replace(fresh.clone());

        let mut changed: Vec<(&String, Option<&RawValue>)> = fresh
            .iter()
            .filter(|(k, v)| old.get(*k) != Some(*v))
            .map(|(k, v)| (k, Some(v)))
            .collect();
        let removed: Vec<String> = old
            .keys()
            .filter(|k| !fresh.contains_key(*k))
            .cloned()
            .collect();
        changed.extend(removed.iter().map(|k| (k, None)));

        tracing::debug!(
            path = %self.inner.config.path.display(),
            changed = changed.len(),
            "file store reloaded"
        );
        for (key, value) in &changed {
            let callbacks = self.inner.watchers.borrow().for_key(key);
            deliver(key, &callbacks, *value);
        }
        Ok(changed.len())
    }

    fn persist(&self, entries: &BTreeMap<String, RawValue>) -> Result<(), StoreError> {
        let config = &self.inner.config;
        let doc = Document {
            format_version: FORMAT_VERSION,
            entries: entries
                .iter()
                .map(|(k, v)| (k.clone(), FileEntry::from_raw(v)))
                .collect(),
        };
        let json = if config.pretty {
            serde_json::to_vec_pretty(&doc)
        } else {
            serde_json::to_vec(&doc)
        }
        .map_err(|err| StoreError::Format(err.to_string()))?;

        let parent = match config.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if config.create_dirs {
            fs::create_dir_all(&parent)?;
        }
        let file_name = config
            .path
            .file_name()
            .ok_or_else(|| {
                StoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "store path has no file name",
                ))
            })?
            .to_string_lossy();
        let tmp_path = parent.join(format!(".{file_name}.tmp"));
        let written = fs::write(&tmp_path, &json).and_then(|()| fs::rename(&tmp_path, &config.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }

    /// Apply `change` to a copy of the map, persist it, then commit.
    fn commit(
        &self,
        key: &str,
        change: impl FnOnce(&mut BTreeMap<String, RawValue>) -> bool,
    ) -> Result<bool, StoreError> {
        let mut next = self.inner.entries.borrow().clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.persist(&next)?;
        *self.inner.entries.borrow_mut() = next;
        tracing::debug!(key, path = %self.inner.config.path.display(), "file store write");
        Ok(true)
    }
}

fn read_document(path: &Path) -> Result<BTreeMap<String, RawValue>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    };
    let doc: Document = serde_json::from_slice(&bytes)
        .map_err(|err| StoreError::Format(format!("{}: {err}", path.display())))?;
    if doc.format_version != FORMAT_VERSION {
        return Err(StoreError::Format(format!(
            "{}: unsupported format version {}",
            path.display(),
            doc.format_version
        )));
    }
    doc.entries
        .into_iter()
        .map(|(k, entry)| {
            let raw = entry.into_raw(&k)?;
            Ok((k, raw))
        })
        .collect()
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.inner.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: RawValue) -> Result<(), StoreError> {
        if let RawValue::Float(f) = &value
            && !f.is_finite()
        {
            return Err(StoreError::Format(format!(
                "entry '{key}': non-finite float {f} cannot be stored as JSON"
            )));
        }
        let stored = value.clone();
        self.commit(key, move |map| {
            map.insert(key.to_owned(), stored);
            true
        })?;
        let callbacks = self.inner.watchers.borrow().for_key(key);
        deliver(key, &callbacks, Some(&value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = self.commit(key, |map| map.remove(key).is_some())?;
        if removed {
            let callbacks = self.inner.watchers.borrow().for_key(key);
            deliver(key, &callbacks, None);
        }
        Ok(())
    }

    fn subscribe(&self, key: &str, on_change: ChangeCallback) -> WatchHandle {
        let handle = self.inner.watchers.borrow_mut().add(key, on_change);
        tracing::debug!(key, ?handle, "file store subscribe");
        handle
    }

    fn unsubscribe(&self, handle: WatchHandle) {
        if let Some(key) = self.inner.watchers.borrow_mut().remove(handle) {
            tracing::debug!(key = %key, ?handle, "file store unsubscribe");
        }
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.inner.config.path)
            .field("entries", &self.inner.entries.borrow().len())
            .field("watchers", &self.inner.watchers.borrow().len())
            .finish()
    }
}
