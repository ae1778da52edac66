#![forbid(unsafe_code)]

//! Persistent key-value stores.
//!
//! A [`Store`] is the preferences database a binding mirrors. It is
//! synchronous and single-threaded. Stores that support change notification
//! call every watcher of a key after each change to that key, whichever
//! handle caused it.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: in-process map; clones share one map.
//! - [`FileStore`]: JSON document on disk with atomic rewrites
//!   (feature `file-store`).

pub mod memory;

#[cfg(feature = "file-store")]
pub mod file;

use std::fmt;
use std::rc::Rc;

use crate::error::StoreError;
use crate::value::RawValue;

#[cfg(feature = "file-store")]
pub use file::{FileStore, FileStoreConfig};
pub use memory::MemoryStore;

/// Called with the new entry for a watched key, or `None` after removal.
pub type ChangeCallback = Box<dyn Fn(Option<&RawValue>)>;

/// Opaque token identifying one registration made by [`Store::subscribe`].
///
/// The same token must be passed back to [`Store::unsubscribe`]; it carries
/// everything the store needs to find the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

/// A synchronous key-value store.
pub trait Store {
    /// Current entry for `key`.
    fn get(&self, key: &str) -> Option<RawValue>;

    /// Write `value` under `key` and notify the key's watchers.
    fn set(&self, key: &str, value: RawValue) -> Result<(), StoreError>;

    /// Delete the entry for `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Watch `key` for changes.
    fn subscribe(&self, key: &str, on_change: ChangeCallback) -> WatchHandle;

    /// Release a registration. Unknown handles are ignored.
    fn unsubscribe(&self, handle: WatchHandle);
}

impl<S: Store + ?Sized> Store for Rc<S> {
    fn get(&self, key: &str) -> Option<RawValue> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: RawValue) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn subscribe(&self, key: &str, on_change: ChangeCallback) -> WatchHandle {
        (**self).subscribe(key, on_change)
    }

    fn unsubscribe(&self, handle: WatchHandle) {
        (**self).unsubscribe(handle);
    }
}

/// RAII registration on a store key.
///
/// Dropping the guard unsubscribes with exactly the handle the store
/// returned, on every exit path of the owning scope.
pub struct StoreWatch {
    store: Rc<dyn Store>,
    handle: WatchHandle,
}

impl StoreWatch {
    /// Subscribe to `key` on `store`.
    pub fn new(store: Rc<dyn Store>, key: &str, on_change: ChangeCallback) -> Self {
        let handle = store.subscribe(key, on_change);
        Self { store, handle }
    }

    #[must_use]
    pub fn handle(&self) -> WatchHandle {
        self.handle
    }
}

impl Drop for StoreWatch {
    fn drop(&mut self) {
        self.store.unsubscribe(self.handle);
    }
}

impl fmt::Debug for StoreWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreWatch")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

type SharedCallback = Rc<dyn Fn(Option<&RawValue>)>;

/// Watcher registry shared by the bundled stores.
#[derive(Default)]
pub(crate) struct Watchers {
    next_id: u64,
    entries: Vec<(WatchHandle, String, SharedCallback)>,
}

impl Watchers {
    pub(crate) fn add(&mut self, key: &str, on_change: ChangeCallback) -> WatchHandle {
        self.next_id += 1;
        let handle = WatchHandle(self.next_id);
        self.entries
            .push((handle, key.to_owned(), SharedCallback::from(on_change)));
        handle
    }

    /// Returns the key the handle was registered for, if it was live.
    pub(crate) fn remove(&mut self, handle: WatchHandle) -> Option<String> {
        let idx = self.entries.iter().position(|(h, _, _)| *h == handle)?;
        Some(self.entries.remove(idx).1)
    }

    /// Callbacks for `key`, cloned so they can run after the borrow ends.
    pub(crate) fn for_key(&self, key: &str) -> Vec<SharedCallback> {
        self.entries
            .iter()
            .filter(|(_, k, _)| k == key)
            .map(|(_, _, cb)| Rc::clone(cb))
            .collect()
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        self.entries.iter().filter(|(_, k, _)| k == key).count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Run `callbacks` with the new entry.
pub(crate) fn deliver(key: &str, callbacks: &[SharedCallback], value: Option<&RawValue>) {
    if callbacks.is_empty() {
        return;
    }
    tracing::trace!(key, watchers = callbacks.len(), "store change delivered");
    for cb in callbacks {
        cb(value);
    }
}
