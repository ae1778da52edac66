#![forbid(unsafe_code)]

//! Stored bindings: an observable value mirrored into a [`Store`] entry.
//!
//! # Synchronization contract
//!
//! A binding keeps three copies of one logical value in step:
//!
//! ```text
//!        set(v)                    external write
//!          │                             │
//!          ▼                             ▼
//!   ┌─────────────┐  encode   ┌────────────────┐
//!   │ cached cell │ ────────▶ │  store entry   │
//!   └─────────────┘ ◀──────── └────────────────┘
//!          │          decode (Watched only)
//!          ▼
//!   listeners (UI refresh)
//! ```
//!
//! # Invariants
//!
//! 1. After a successful `set(v)` the cache holds `v` and the store holds
//!    `encode(v)`.
//! 2. A failed `set` changes neither the cache nor the store.
//! 3. Each successful `set` runs every listener exactly once; the binding's
//!    own store write is never fed back into it. If another observer
//!    replaces the entry while that write is being delivered, a `Watched`
//!    binding caches the replacement instead of its own value.
//! 4. Construction never fails on undecodable data: the default is used and,
//!    unless disabled, written back over the bad entry.
//! 5. With [`ChangeTracking::Watched`], an external change that fails to
//!    decode (or removes the entry) resets the cache to the default value,
//!    not to the last good one.
//!
//! # Threading
//!
//! Bindings are `!Send` and expect to live on the thread that owns the UI.
//! Store notifications are delivered synchronously on the writing thread.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::codec::{Codec, Storable};
use crate::error::BindingError;
use crate::reactive::{ObservableCell, Subscription};
use crate::store::{Store, StoreWatch};
use crate::value::RawValue;

/// How a binding learns that its store entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeTracking {
    /// Read once at construction; later external writes are not observed.
    Cached,
    /// Subscribe to the key and follow external writes.
    #[default]
    Watched,
}

/// Configuration for a [`StoredBinding`].
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// External change strategy.
    pub tracking: ChangeTracking,
    /// Overwrite an undecodable entry with the encoded default at
    /// construction.
    pub rewrite_on_decode_failure: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            tracking: ChangeTracking::Watched,
            rewrite_on_decode_failure: true,
        }
    }
}

impl BindingConfig {
    /// Cache-only config: no store subscription.
    #[must_use]
    pub fn cached() -> Self {
        Self::default().with_tracking(ChangeTracking::Cached)
    }

    #[must_use]
    pub fn with_tracking(mut self, tracking: ChangeTracking) -> Self {
        self.tracking = tracking;
        self
    }

    #[must_use]
    pub fn with_rewrite_on_decode_failure(mut self, enabled: bool) -> Self {
        self.rewrite_on_decode_failure = enabled;
        self
    }
}

struct Shared<T> {
    key: String,
    default: T,
    codec: Box<dyn Codec<T>>,
    store: Rc<dyn Store>,
    cell: ObservableCell<T>,
    /// Whether the binding follows external changes to its entry.
    watched: bool,
    /// Set while this binding writes to the store, so the echo from its own
    /// subscription is ignored.
    writing: Cell<bool>,
}

impl<T: Clone + fmt::Debug + 'static> Shared<T> {
    fn encode(&self, value: &T) -> Result<RawValue, BindingError> {
        self.codec
            .encode(value)
            .map_err(|source| BindingError::Encode {
                key: self.key.clone(),
                source,
            })
    }

    fn write(&self, value: T) -> Result<(), BindingError> {
        let raw = self.encode(&value)?;
        self.with_echo_suppressed(|store, key| store.set(key, raw.clone()))?;
        match self.overwritten_since(Some(&raw)) {
            Some(current) => self.cell.set(self.resolve(current.as_ref())),
            None => self.cell.set(value),
        }
        Ok(())
    }

    fn remove(&self) -> Result<(), BindingError> {
        self.with_echo_suppressed(|store, key| store.remove(key))?;
        match self.overwritten_since(None) {
            Some(current) => self.cell.set(self.resolve(current.as_ref())),
            None => self.cell.set(self.default.clone()),
        }
        Ok(())
    }

    /// Entry as it stands after our own write, if someone replaced it while
    /// notifications were running. Notifications that arrive during the write
    /// are suppressed, so the store is the only place a nested change shows.
    fn overwritten_since(&self, written: Option<&RawValue>) -> Option<Option<RawValue>> {
        if !self.watched {
            return None;
        }
        let current = self.store.get(&self.key);
        if current.as_ref() == written {
            return None;
        }
        tracing::debug!(key = %self.key, "entry replaced during write; adopting stored value");
        Some(current)
    }

    fn with_echo_suppressed(
        &self,
        op: impl FnOnce(&dyn Store, &str) -> Result<(), crate::error::StoreError>,
    ) -> Result<(), BindingError> {
        let was_writing = self.writing.replace(true);
        let result = op(self.store.as_ref(), &self.key);
        self.writing.set(was_writing);
        result.map_err(|source| BindingError::Store {
            key: self.key.clone(),
            source,
        })
    }

    fn on_store_change(&self, raw: Option<&RawValue>) {
        if self.writing.get() {
            return;
        }
        self.cell.set(self.resolve(raw));
    }

    /// Decode an external entry, falling back to the default.
    fn resolve(&self, raw: Option<&RawValue>) -> T {
        match raw {
            Some(raw) => match self.codec.decode(raw) {
                Some(value) => value,
                None => {
                    tracing::warn!(
                        key = %self.key,
                        default = ?self.default,
                        type_name = std::any::type_name::<T>(),
                        raw = %raw,
                        "external change failed to decode; resetting to default"
                    );
                    self.default.clone()
                }
            },
            None => {
                tracing::debug!(key = %self.key, "stored entry removed; resetting to default");
                self.default.clone()
            }
        }
    }
}

/// A typed value bound to one key of a [`Store`].
///
/// Dropping the binding releases its store subscription. Outstanding
/// [`BindingHandle`]s keep working but stop following external changes.
pub struct StoredBinding<T> {
    shared: Rc<Shared<T>>,
    watch: Option<StoreWatch>,
}

impl<T: Storable + Clone + fmt::Debug + 'static> StoredBinding<T> {
    /// Bind `key` using `T`'s default codec and [`BindingConfig::default`].
    pub fn new(
        key: impl Into<String>,
        default: T,
        store: impl Store + 'static,
    ) -> Result<Self, BindingError> {
        Self::with_config(key, default, store, T::codec(), BindingConfig::default())
    }
}

impl<T: Clone + fmt::Debug + 'static> StoredBinding<T> {
    /// Bind `key` with an explicit codec and the default config.
    pub fn with_codec(
        key: impl Into<String>,
        default: T,
        store: impl Store + 'static,
        codec: impl Codec<T> + 'static,
    ) -> Result<Self, BindingError> {
        Self::with_config(key, default, store, codec, BindingConfig::default())
    }

    /// Bind `key` with an explicit codec and config.
    ///
    /// Reads and decodes the current entry. A missing or undecodable entry
    /// yields `default`, which is then written to the store. Errors only
    /// come from encoding or writing that default.
    pub fn with_config(
        key: impl Into<String>,
        default: T,
        store: impl Store + 'static,
        codec: impl Codec<T> + 'static,
        config: BindingConfig,
    ) -> Result<Self, BindingError> {
        let key = key.into();
        let store: Rc<dyn Store> = Rc::new(store);
        let initial = load_initial(&key, &default, &codec, store.as_ref(), &config)?;

        let shared = Rc::new(Shared {
            key,
            default,
            codec: Box::new(codec),
            store,
            cell: ObservableCell::new(initial),
            watched: config.tracking == ChangeTracking::Watched,
            writing: Cell::new(false),
        });

        let watch = match config.tracking {
            ChangeTracking::Cached => None,
            ChangeTracking::Watched => {
                let weak: Weak<Shared<T>> = Rc::downgrade(&shared);
                Some(StoreWatch::new(
                    Rc::clone(&shared.store),
                    &shared.key,
                    Box::new(move |raw: Option<&RawValue>| {
                        if let Some(shared) = weak.upgrade() {
                            shared.on_store_change(raw);
                        }
                    }),
                ))
            }
        };

        Ok(Self { shared, watch })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    #[must_use]
    pub fn default_value(&self) -> &T {
        &self.shared.default
    }

    #[must_use]
    pub fn tracking(&self) -> ChangeTracking {
        if self.watch.is_some() {
            ChangeTracking::Watched
        } else {
            ChangeTracking::Cached
        }
    }

    /// Cached value. Never touches the store.
    #[must_use]
    pub fn get(&self) -> T {
        self.shared.cell.get()
    }

    /// Borrow the cached value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.shared.cell.with(f)
    }

    /// Encode and persist `value`, then update the cache and notify listeners.
    pub fn set(&self, value: T) -> Result<(), BindingError> {
        self.shared.write(value)
    }

    /// Read-modify-write through [`set`](Self::set).
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), BindingError> {
        let mut value = self.get();
        f(&mut value);
        self.set(value)
    }

    /// Write the default value back.
    pub fn reset(&self) -> Result<(), BindingError> {
        self.set(self.shared.default.clone())
    }

    /// Delete the store entry and reset the cache to the default without
    /// persisting it.
    pub fn remove(&self) -> Result<(), BindingError> {
        self.shared.remove()
    }

    /// Listen for changes to the cached value.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.shared.cell.subscribe(listener)
    }

    /// Writes and notifications seen by the cache since construction.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.cell.version()
    }

    /// Run listeners without changing the value.
    pub fn notify_changed(&self) {
        self.shared.cell.notify();
    }

    /// The underlying observable cell, for adapting to a UI layer.
    #[must_use]
    pub fn cell(&self) -> ObservableCell<T> {
        self.shared.cell.clone()
    }

    /// A cloneable get/set pair sharing this binding's state.
    #[must_use]
    pub fn handle(&self) -> BindingHandle<T> {
        BindingHandle {
            shared: Rc::clone(&self.shared),
        }
    }
}

/// Resolve the value a new binding starts from. Runs before any store
/// subscription exists, so writes here are plain store writes.
fn load_initial<T: Clone + fmt::Debug>(
    key: &str,
    default: &T,
    codec: &dyn Codec<T>,
    store: &dyn Store,
    config: &BindingConfig,
) -> Result<T, BindingError> {
    let write_default = || -> Result<(), BindingError> {
        let encoded = codec.encode(default).map_err(|source| BindingError::Encode {
            key: key.to_owned(),
            source,
        })?;
        store
            .set(key, encoded)
            .map_err(|source| BindingError::Store {
                key: key.to_owned(),
                source,
            })
    };

    let Some(raw) = store.get(key) else {
        tracing::debug!(key, "no stored entry; writing default");
        write_default()?;
        return Ok(default.clone());
    };

    if let Some(value) = codec.decode(&raw) {
        return Ok(value);
    }

    tracing::warn!(
        key,
        default = ?default,
        type_name = std::any::type_name::<T>(),
        raw = %raw,
        "stored value failed to decode; using default"
    );
    if config.rewrite_on_decode_failure {
        write_default()?;
    }
    Ok(default.clone())
}

impl<T: fmt::Debug> fmt::Debug for StoredBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredBinding")
            .field("key", &self.shared.key)
            .field("cell", &self.shared.cell)
            .field("watch", &self.watch)
            .finish()
    }
}

/// Two-way handle onto a [`StoredBinding`], for direct UI data binding.
pub struct BindingHandle<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for BindingHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> BindingHandle<T> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.shared.cell.get()
    }

    pub fn set(&self, value: T) -> Result<(), BindingError> {
        self.shared.write(value)
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.shared.cell.subscribe(listener)
    }
}

impl<T: fmt::Debug> fmt::Debug for BindingHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHandle")
            .field("key", &self.shared.key)
            .finish_non_exhaustive()
    }
}
