#![forbid(unsafe_code)]

//! In-process store.
//!
//! Clones of a [`MemoryStore`] share one map and one watcher list, so a
//! clone behaves like a second process attached to the same preferences
//! domain: its writes are external changes to every binding on the other
//! handle.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::{ChangeCallback, Store, WatchHandle, Watchers, deliver};
use crate::error::StoreError;
use crate::value::RawValue;

#[derive(Default)]
struct MemoryInner {
    entries: RefCell<BTreeMap<String, RawValue>>,
    watchers: RefCell<Watchers>,
    read_only: Cell<bool>,
}

/// Shared in-memory key-value store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`. No watchers exist yet,
    /// so nothing is notified.
    #[must_use]
    pub fn with_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, RawValue)>) -> Self {
        let store = Self::new();
        store
            .inner
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        store
    }

    /// Reject every subsequent write with [`StoreError::Unavailable`].
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.set(read_only);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    /// Sorted copy of every key.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Number of live registrations on `key`.
    #[must_use]
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner.watchers.borrow().count(key)
    }

    fn check_writable(&self, key: &str) -> Result<(), StoreError> {
        if self.inner.read_only.get() {
            return Err(StoreError::Unavailable(format!(
                "memory store is read-only (key '{key}')"
            )));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.inner.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: RawValue) -> Result<(), StoreError> {
        self.check_writable(key)?;
        self.inner
            .entries
            .borrow_mut()
            .insert(key.to_owned(), value.clone());
        tracing::debug!(key, kind = value.kind(), "memory store set");
        let callbacks = self.inner.watchers.borrow().for_key(key);
        deliver(key, &callbacks, Some(&value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable(key)?;
        let removed = self.inner.entries.borrow_mut().remove(key);
        if removed.is_none() {
            return Ok(());
        }
        tracing::debug!(key, "memory store remove");
        let callbacks = self.inner.watchers.borrow().for_key(key);
        deliver(key, &callbacks, None);
        Ok(())
    }

    fn subscribe(&self, key: &str, on_change: ChangeCallback) -> WatchHandle {
        let handle = self.inner.watchers.borrow_mut().add(key, on_change);
        tracing::debug!(key, ?handle, "memory store subscribe");
        handle
    }

    fn unsubscribe(&self, handle: WatchHandle) {
        if let Some(key) = self.inner.watchers.borrow_mut().remove(handle) {
            tracing::debug!(key = %key, ?handle, "memory store unsubscribe");
        }
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.inner.entries.borrow())
            .field("watchers", &self.inner.watchers.borrow().len())
            .field("read_only", &self.inner.read_only.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_remove() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("a"), None);

        store.set("a", RawValue::Bool(true)).unwrap();
        assert_eq!(store.get("a"), Some(RawValue::Bool(true)));
        assert_eq!(store.len(), 1);

        store.remove("a").unwrap();
        assert!(!store.contains_key("a"));
        store.remove("a").unwrap();
    }

    #[test]
    fn with_entries_seeds_map() {
        let store = MemoryStore::with_entries([("b", RawValue::Int(2)), ("a", RawValue::Int(1))]);
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clones_share_entries_and_watchers() {
        let store = MemoryStore::new();
        let other = store.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = Rc::clone(&seen);
        let handle = store.subscribe(
            "k",
            Box::new(move |v: Option<&RawValue>| seen_in.borrow_mut().push(v.cloned())),
        );

        other.set("k", RawValue::from("x")).unwrap();
        other.set("unrelated", RawValue::Int(0)).unwrap();
        other.remove("k").unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![Some(RawValue::String("x".into())), None]
        );
        store.unsubscribe(handle);
        assert_eq!(other.watcher_count("k"), 0);
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = MemoryStore::with_entries([("k", RawValue::Int(1))]);
        store.set_read_only(true);
        assert!(matches!(
            store.set("k", RawValue::Int(2)),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.remove("k").is_err());
        assert_eq!(store.get("k"), Some(RawValue::Int(1)));

        store.set_read_only(false);
        store.set("k", RawValue::Int(2)).unwrap();
    }

    #[test]
    fn callback_may_write_back() {
        let store = MemoryStore::new();
        let writer = store.clone();
        let _handle = store.subscribe(
            "source",
            Box::new(move |v: Option<&RawValue>| {
                if let Some(v) = v {
                    writer.set("mirror", v.clone()).unwrap();
                }
            }),
        );

        store.set("source", RawValue::Float(1.5)).unwrap();
        assert_eq!(store.get("mirror"), Some(RawValue::Float(1.5)));
    }
}
