#![forbid(unsafe_code)]

//! Mutable external store for the tearlab tearing demonstration.
//!
//! An *external* store is state mutated outside a rendering framework's own
//! coordinated update mechanism — here, by a simulated input event source.
//! This crate provides:
//!
//! - [`ExternalStore`]: a shared, single-value store with a synchronous
//!   read path and subscriber callbacks.
//! - [`EventFeed`]: the single writer handle, representing the store's
//!   attachment to its external event source.
//! - [`Subscription`]: guard that removes the listener on drop, with an
//!   explicit idempotent [`unsubscribe()`](Subscription::unsubscribe).
//!
//! # Architecture
//!
//! `ExternalStore<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Mutation and notification are synchronous and run to
//! completion, so readers never observe a partially written value.
//!
//! # Invariants
//!
//! 1. Only the [`EventFeed`] writes the value (single-writer).
//! 2. Every emit notifies all currently registered listeners. The store
//!    performs no equality filtering; suppressing redundant updates is the
//!    reader's concern.
//! 3. Unsubscribing twice is a no-op, and never removes another listener.
//! 4. After [`destroy()`](ExternalStore::destroy), no emit reaches any
//!    previously registered listener.

pub mod store;

pub use store::{EventFeed, ExternalStore, Subscription};
