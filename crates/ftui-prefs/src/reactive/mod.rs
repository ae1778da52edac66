#![forbid(unsafe_code)]

//! Change-notification primitives shared by bindings and UI layers.
//!
//! - [`ObservableCell`]: a shared value with a version counter and an
//!   ordered list of listeners, notified synchronously on every write.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Invariants
//!
//! 1. Each `set()`, `replace()` or `notify()` advances the version by one and
//!    runs every live listener exactly once.
//! 2. Listeners run in registration order.
//! 3. A dropped [`Subscription`] is never called again.
//!
//! The cell is `!Send`: it is meant to live on the thread that owns the UI.

pub mod observable;

pub use observable::{ObservableCell, Subscription};
