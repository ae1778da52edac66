#![forbid(unsafe_code)]

//! Reactive stored values for FrankenTUI.
//!
//! # Role in FrankenTUI
//! `ftui-prefs` binds a typed in-memory value to one entry of a persistent
//! key-value store, so that UI state such as a theme choice, a sidebar width
//! or the last opened file survives restarts without per-widget plumbing.
//!
//! # Primary responsibilities
//! - **StoredBinding**: read-through cache over a store entry, writing
//!   encoded values back and notifying listeners on every change.
//! - **Codecs**: per-type mapping onto the store's primitive values, with a
//!   [`Storable`] registry for defaults and [`JsonCodec`] for structured data.
//! - **Stores**: the [`Store`] trait plus in-memory and JSON-file backends.
//! - **ObservableCell**: the change-notification primitive a UI layer
//!   subscribes to.
//!
//! # Example
//!
//! ```
//! use ftui_prefs::{MemoryStore, StoredBinding};
//!
//! let store = MemoryStore::new();
//! let sidebar = StoredBinding::new("sidebar.width", 24i64, store.clone()).unwrap();
//!
//! sidebar.set(30).unwrap();
//!
//! // A fresh binding (e.g. after restart) sees the persisted value.
//! let again = StoredBinding::new("sidebar.width", 24i64, store).unwrap();
//! assert_eq!(again.get(), 30);
//! ```

pub mod binding;
pub mod codec;
pub mod error;
pub mod reactive;
pub mod store;
pub mod value;

pub use binding::{BindingConfig, BindingHandle, ChangeTracking, StoredBinding};
pub use codec::{
    Codec, FnCodec, IntTagCodec, IntTagged, JsonCodec, NativeCodec, Storable, StrTagCodec,
    StrTagged, UrlCodec,
};
pub use error::{BindingError, EncodeError, StoreError};
pub use reactive::{ObservableCell, Subscription};
#[cfg(feature = "file-store")]
pub use store::{FileStore, FileStoreConfig};
pub use store::{MemoryStore, Store, StoreWatch, WatchHandle};
pub use value::{RawValue, Url, UrlParseError};
