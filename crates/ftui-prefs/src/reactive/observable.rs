#![forbid(unsafe_code)]

//! Observable cell: a shared value plus an ordered list of change listeners.
//!
//! # Design
//!
//! [`ObservableCell<T>`] keeps its value in `Rc<RefCell<..>>`. Every write
//! through [`set`](ObservableCell::set) bumps the version and notifies live
//! subscribers in registration order, whether or not the value compared
//! equal. This is the contract a UI layer needs from a stored binding: one
//! write, one refresh signal. [`set_if_changed`](ObservableCell::set_if_changed)
//! is the `PartialEq`-gated variant.
//!
//! # Performance
//!
//! | Operation     | Complexity                 |
//! |---------------|----------------------------|
//! | `get()`       | O(1) + clone               |
//! | `set()`       | O(S) where S = subscribers |
//! | `subscribe()` | O(1) amortized             |
//!
//! # Failure Modes
//!
//! - **Borrow inside `with`**: calling `set()` from inside a `with()` closure
//!   on the same cell panics (RefCell borrow rules).
//! - **Re-entrant set from a subscriber**: allowed. Callbacks run after the
//!   borrow is released, so a nested `set()` starts its own notification
//!   pass before the outer one finishes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;
type WeakListener<T> = Weak<dyn Fn(&T)>;

struct CellState<T> {
    value: T,
    version: u64,
    /// Weak so that dropping a [`Subscription`] is enough to unsubscribe.
    listeners: Vec<WeakListener<T>>,
}

/// A shared, versioned value with synchronous change notification.
///
/// Cloning creates another handle to the same state.
pub struct ObservableCell<T> {
    state: Rc<RefCell<CellState<T>>>,
}

impl<T> Clone for ObservableCell<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ObservableCell")
            .field("value", &state.value)
            .field("version", &state.version)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl<T: Clone + 'static> ObservableCell<T> {
    /// Create a cell at version 0 with no subscribers.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(CellState {
                value,
                version: 0,
                listeners: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.state.borrow().value.clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.borrow().value)
    }

    /// Store `value`, bump the version and notify every live subscriber once.
    pub fn set(&self, value: T) {
        {
            let mut state = self.state.borrow_mut();
            state.value = value;
            state.version += 1;
        }
        self.dispatch();
    }

    /// Replace the value, returning the previous one. Notifies like [`set`](Self::set).
    pub fn replace(&self, value: T) -> T {
        let old = {
            let mut state = self.state.borrow_mut();
            state.version += 1;
            std::mem::replace(&mut state.value, value)
        };
        self.dispatch();
        old
    }

    /// Signal observers without changing the value.
    ///
    /// The version still advances, so render loops that dirty-check on
    /// [`version`](Self::version) pick the signal up too.
    pub fn notify(&self) {
        self.state.borrow_mut().version += 1;
        self.dispatch();
    }

    /// Register a listener. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let strong: Listener<T> = Rc::new(listener);
        self.state
            .borrow_mut()
            .listeners
            .push(Rc::downgrade(&strong));
        Subscription {
            _listener: Box::new(strong),
        }
    }

    /// Number of writes and explicit notifications since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Number of subscribers whose guard is still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn dispatch(&self) {
        let (listeners, value) = {
            let mut state = self.state.borrow_mut();
            state.listeners.retain(|w| w.strong_count() > 0);
            let live: Vec<Listener<T>> =
                state.listeners.iter().filter_map(Weak::upgrade).collect();
            (live, state.value.clone())
        };
        tracing::trace!(subscribers = listeners.len(), "observable cell notify");
        for listener in &listeners {
            listener(&value);
        }
    }
}

impl<T: Clone + PartialEq + 'static> ObservableCell<T> {
    /// Store `value` only if it differs from the current one.
    ///
    /// Returns `true` when a write (and notification) happened.
    pub fn set_if_changed(&self, value: T) -> bool {
        if self.state.borrow().value == value {
            return false;
        }
        self.set(value);
        true
    }
}

/// RAII guard for a cell listener.
///
/// Holds the only strong reference to the listener; once dropped, the
/// cell's weak entry can no longer be upgraded and is pruned on the next
/// notification.
pub struct Subscription {
    _listener: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
