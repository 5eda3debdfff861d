#![forbid(unsafe_code)]

//! Single-value store with subscribe/notify and a detachable writer.
//!
//! # Design
//!
//! [`ExternalStore<T>`] and its [`EventFeed<T>`] are two handles over one
//! shared interior. The store side exposes the read/subscribe/destroy
//! surface consumed by renderers; the feed side is handed to the external
//! event source and is the only code path that writes the value.
//!
//! The feed holds a `Weak` reference, so an event source that outlives the
//! store degrades to emitting into the void rather than keeping state
//! alive.
//!
//! # Failure Modes
//!
//! - **Emit after destroy/drop**: silently absorbed.
//! - **Unsubscribe after destroy**: the listener list is already empty;
//!   removal by id is a no-op.
//! - **Listener mutates the registration list mid-notification**: the
//!   notifier iterates a snapshot taken before the first callback, so
//!   re-entrant subscribe/unsubscribe cannot skip or double-invoke other
//!   listeners.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener = Rc<RefCell<dyn FnMut()>>;

/// Shared interior for [`ExternalStore<T>`] and [`EventFeed<T>`].
struct Inner<T> {
    /// Current value. Written only by the feed.
    value: T,
    /// Registered listeners, keyed by registration id. Order is an
    /// implementation detail and must not be relied upon.
    listeners: Vec<(u64, Listener)>,
    /// Next registration id. Ids are never reused.
    next_listener_id: u64,
    /// Set by `destroy()`. A detached store accepts no further writes.
    detached: bool,
}

/// A shared, single-value store mutated by an external event source.
///
/// Cloning creates a new handle to the **same** store. Readers call
/// [`get()`](Self::get) at any time, including mid-render; listeners
/// registered through [`subscribe()`](Self::subscribe) are invoked
/// synchronously after every write.
pub struct ExternalStore<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for ExternalStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ExternalStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ExternalStore")
            .field("value", &inner.value)
            .field("listeners", &inner.listeners.len())
            .field("detached", &inner.detached)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ExternalStore<T> {
    /// Create a store and the single writer handle for its event source.
    ///
    /// The feed is the only way to mutate the value. Constructing the pair
    /// explicitly (rather than through a module-level singleton) keeps the
    /// store testable in isolation and makes ownership of the write side
    /// visible at the call site.
    #[must_use]
    pub fn with_feed(initial: T) -> (Self, EventFeed<T>) {
        let inner = Rc::new(RefCell::new(Inner {
            value: initial,
            listeners: Vec::new(),
            next_listener_id: 0,
            detached: false,
        }));
        let feed = EventFeed {
            inner: Rc::downgrade(&inner),
        };
        (Self { inner }, feed)
    }

    /// Read the current value.
    ///
    /// Synchronous and side-effect-free. Always returns the latest value
    /// written by the feed; safe to call from any context, including in the
    /// middle of a render attempt.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Register a listener invoked synchronously after every write.
    ///
    /// Returns a [`Subscription`] that removes the listener when dropped or
    /// when [`unsubscribe()`](Subscription::unsubscribe) is called. Each
    /// registration gets a fresh identity; subscribing the same closure
    /// twice yields two independent registrations.
    pub fn subscribe(&self, on_change: impl FnMut() + 'static) -> Subscription {
        let listener: Listener = Rc::new(RefCell::new(on_change));
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.push((id, listener));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Clear all listeners and detach the feed.
    ///
    /// After this call, further emits are silently absorbed and reach no
    /// previously registered listener. Outstanding [`Subscription`] guards
    /// remain safe to drop or unsubscribe.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.detached = true;
        inner.listeners.clear();
    }

    /// Stable identity of this store instance.
    ///
    /// Two handles compare equal here iff they refer to the same store.
    /// Consumers use this to detect that the store they read from changed
    /// between render attempts.
    #[must_use]
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Number of currently registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Writer handle held by the external event source.
///
/// Emitting writes the value and then synchronously notifies every
/// currently registered listener. The feed holds only a weak reference:
/// emitting after the store was dropped or destroyed is a no-op.
pub struct EventFeed<T> {
    inner: Weak<RefCell<Inner<T>>>,
}

impl<T> Clone for EventFeed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for EventFeed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("attached", &self.inner.upgrade().is_some())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> EventFeed<T> {
    /// Write a new value and notify listeners.
    ///
    /// Notification order is unspecified. The listener list is snapshotted
    /// before the first callback runs, so listeners may subscribe or
    /// unsubscribe re-entrantly without affecting this notification cycle.
    pub fn emit(&self, value: T) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let listeners: Vec<Listener> = {
            let mut guard = inner.borrow_mut();
            if guard.detached {
                return;
            }
            guard.value = value;
            guard
                .listeners
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect()
        };
        for listener in listeners {
            (&mut *listener.borrow_mut())();
        }
    }

    /// Whether the feed still reaches a live, non-destroyed store.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| !inner.borrow().detached)
    }
}

/// Guard for one listener registration.
///
/// Removes the listener when dropped. [`unsubscribe()`](Self::unsubscribe)
/// does the same eagerly and is idempotent: the second and later calls are
/// no-ops, as is unsubscribing after the store already cleared its
/// listeners.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Remove the listener registration. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether the registration has not yet been cancelled from this side.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
