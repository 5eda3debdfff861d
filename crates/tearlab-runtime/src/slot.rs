#![forbid(unsafe_code)]

//! Store accessors: the synchronized read protocol and its uncoordinated
//! counterpart.
//!
//! # Design
//!
//! A *slot* is the per-consumer state a component keeps between render
//! attempts for one external store value. During `render`, a component
//! calls `slot.read(&store, cx)`; the slot registers a hook with the pass
//! so the scheduler can consult it before and after commit.
//!
//! [`SyncSlot`] implements the synchronized protocol:
//!
//! 1. Read the current value and record it as the attempt's provisional
//!    reading.
//! 2. Before commit, the scheduler re-reads through the hook; any mismatch
//!    with the provisional reading abandons the whole pass.
//! 3. After commit (never for an abandoned attempt), the slot subscribes to
//!    the store, then immediately re-reads once in case a mutation landed in
//!    the gap, invalidating if the committed snapshot is already stale.
//! 4. Each later notification re-reads and invalidates only if the value
//!    differs from the last committed snapshot (value equality, not
//!    identity).
//! 5. If a render switches the slot to a different store, notifications
//!    from the superseded registration are ignored until the commit that
//!    replaces the subscription.
//!
//! [`DirectSlot`] skips steps 2-5 and returns the raw read. Its only
//! subscription is a cosmetic post-commit refresh; nothing stops two
//! consumers in one pass from committing values from different instants.
//!
//! # Invariants
//!
//! 1. Subscriptions are established only in the post-commit phase, so an
//!    abandoned attempt leaves no registration behind.
//! 2. The committed snapshot only changes at commit time or never.
//! 3. Dropping a slot drops its subscription; unsubscription is exactly
//!    once.

use std::cell::RefCell;
use std::rc::Rc;

use tearlab_store::{ExternalStore, Subscription};

use crate::component::{CommitCx, RenderCx};

/// Pass participation surface registered by slots during `read`.
///
/// The scheduler calls `is_consistent` on every hook at the end of a pass;
/// any `false` abandons the pass. `on_commit` runs only for committed
/// passes, once per hook.
pub(crate) trait PassHook {
    fn is_consistent(&self) -> bool;
    fn on_commit(&self, cx: &CommitCx);
}

/// Shared interior for [`SyncSlot<T>`].
struct SyncInner<T> {
    /// Store used by the latest render attempt.
    store: Option<ExternalStore<T>>,
    /// Snapshot of the last committed attempt.
    committed: Option<T>,
    /// Reading taken by the in-flight attempt.
    provisional: Option<T>,
    /// Live registration, post-commit only.
    subscription: Option<Subscription>,
    /// Identity of the store the registration was made against.
    subscribed_store: Option<usize>,
}

/// Synchronized accessor: a store read that cannot commit stale.
///
/// The value a `SyncSlot` contributes to a committed frame is never older
/// than the store's value at the moment the commit became observable; any
/// change arriving between the attempt's read and the commit forces a
/// discard-and-retry instead. The cost is one extra synchronous read per
/// commit and extra render attempts under high-frequency mutation — callers
/// needing liveness must debounce the mutation rate upstream.
pub struct SyncSlot<T> {
    inner: Rc<RefCell<SyncInner<T>>>,
}

impl<T> SyncSlot<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SyncInner {
                store: None,
                committed: None,
                provisional: None,
                subscription: None,
                subscribed_store: None,
            })),
        }
    }
}

impl<T> Default for SyncSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SyncSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SyncSlot")
            .field("committed", &inner.committed)
            .field("provisional", &inner.provisional)
            .field("subscribed", &inner.subscription.is_some())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> SyncSlot<T> {
    /// Read the store's current value for this render attempt.
    ///
    /// Records the reading for the pre-commit consistency check and
    /// registers the slot's hook with the pass. Switching to a different
    /// store between attempts is treated as an external change: the read is
    /// fresh by construction, and notifications from the old registration
    /// are ignored until commit replaces it.
    pub fn read(&self, store: &ExternalStore<T>, cx: &mut RenderCx<'_>) -> T {
        let value = store.get();
        {
            let mut inner = self.inner.borrow_mut();
            inner.store = Some(store.clone());
            inner.provisional = Some(value.clone());
        }
        cx.register(Rc::new(SyncHook {
            slot: Rc::clone(&self.inner),
        }));
        value
    }

    /// Snapshot of the last committed attempt, if any. Test and diagnostic
    /// visibility; not part of the protocol.
    #[must_use]
    pub fn committed(&self) -> Option<T> {
        self.inner.borrow().committed.clone()
    }

    /// Whether a post-commit subscription is currently live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.borrow().subscription.is_some()
    }
}

struct SyncHook<T> {
    slot: Rc<RefCell<SyncInner<T>>>,
}

impl<T: Clone + PartialEq + 'static> PassHook for SyncHook<T> {
    fn is_consistent(&self) -> bool {
        let (store, provisional) = {
            let inner = self.slot.borrow();
            (inner.store.clone(), inner.provisional.clone())
        };
        let Some(store) = store else {
            return true;
        };
        Some(store.get()) == provisional
    }

    fn on_commit(&self, cx: &CommitCx) {
        let (store, need_subscribe) = {
            let mut inner = self.slot.borrow_mut();
            inner.committed = inner.provisional.clone();
            let Some(store) = inner.store.clone() else {
                return;
            };
            let need = inner.subscription.is_none()
                || inner.subscribed_store != Some(store.ptr_id());
            (store, need)
        };

        if need_subscribe {
            // Replacing the registration drops the old one outright; the
            // identity check in the handler covers the window between a
            // render that switched stores and this commit.
            let weak = Rc::downgrade(&self.slot);
            let subscribed_id = store.ptr_id();
            let handler_store = store.clone();
            let invalidator = cx.invalidator().clone();
            let sub = store.subscribe(move || {
                let Some(slot) = weak.upgrade() else {
                    return;
                };
                let stale = {
                    let inner = slot.borrow();
                    inner.store.as_ref().map(ExternalStore::ptr_id) != Some(subscribed_id)
                };
                if stale {
                    return;
                }
                let fresh = handler_store.get();
                // Value-equality short-circuit: identical values force no
                // re-render.
                let changed = slot.borrow().committed.as_ref() != Some(&fresh);
                if changed {
                    invalidator.invalidate();
                }
            });
            let mut inner = self.slot.borrow_mut();
            inner.subscription = Some(sub);
            inner.subscribed_store = Some(subscribed_id);
        }

        // A mutation may have landed between the attempt's read and the
        // subscription above. Re-read once; if the committed snapshot is
        // already stale, force a new attempt with the fresh value.
        let fresh = store.get();
        let stale = self.slot.borrow().committed.as_ref() != Some(&fresh);
        if stale {
            cx.invalidator().invalidate();
        }
    }
}

/// Shared interior for [`DirectSlot<T>`].
struct DirectInner<T> {
    store: Option<ExternalStore<T>>,
    subscription: Option<Subscription>,
    subscribed_store: Option<usize>,
}

/// Uncoordinated accessor: the deliberately tearing-prone path.
///
/// `read` returns the store's current value with no participation in the
/// consistency protocol. Two reads within one update cycle may observe
/// different values if the store mutates between them, and both can reach
/// the committed output. The post-commit subscription exists only so the
/// consumer refreshes after external changes; it performs no staleness
/// check of any kind.
pub struct DirectSlot<T> {
    inner: Rc<RefCell<DirectInner<T>>>,
}

impl<T> DirectSlot<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DirectInner {
                store: None,
                subscription: None,
                subscribed_store: None,
            })),
        }
    }
}

impl<T> Default for DirectSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DirectSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DirectSlot")
            .field("subscribed", &inner.subscription.is_some())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> DirectSlot<T> {
    /// Read the store's current value, uncoordinated.
    pub fn read(&self, store: &ExternalStore<T>, cx: &mut RenderCx<'_>) -> T {
        let value = store.get();
        self.inner.borrow_mut().store = Some(store.clone());
        cx.register(Rc::new(DirectHook {
            slot: Rc::clone(&self.inner),
        }));
        value
    }

    /// Whether the cosmetic refresh subscription is currently live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.borrow().subscription.is_some()
    }
}

struct DirectHook<T> {
    slot: Rc<RefCell<DirectInner<T>>>,
}

impl<T: Clone + PartialEq + 'static> PassHook for DirectHook<T> {
    fn is_consistent(&self) -> bool {
        // No guarantee on purpose.
        true
    }

    fn on_commit(&self, cx: &CommitCx) {
        let (store, need_subscribe) = {
            let inner = self.slot.borrow();
            let Some(store) = inner.store.clone() else {
                return;
            };
            let need = inner.subscription.is_none()
                || inner.subscribed_store != Some(store.ptr_id());
            (store, need)
        };
        if need_subscribe {
            let invalidator = cx.invalidator().clone();
            let sub = store.subscribe(move || invalidator.invalidate());
            let mut inner = self.slot.borrow_mut();
            inner.subscription = Some(sub);
            inner.subscribed_store = Some(store.ptr_id());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Invalidator;
    use std::cell::Cell;

    fn commit_cx(dirty: &Rc<Cell<bool>>) -> CommitCx {
        CommitCx::new(Invalidator::new(Rc::clone(dirty)))
    }

    fn render_read<T: Clone + PartialEq + 'static>(
        slot: &SyncSlot<T>,
        store: &ExternalStore<T>,
    ) -> (T, Vec<Rc<dyn PassHook>>) {
        let mut hooks = Vec::new();
        let mut cx = RenderCx::new(&mut hooks, 0);
        let value = slot.read(store, &mut cx);
        (value, hooks)
    }

    #[test]
    fn consistent_when_store_unchanged() {
        let (store, _feed) = ExternalStore::with_feed(1);
        let slot = SyncSlot::new();
        let (value, hooks) = render_read(&slot, &store);
        assert_eq!(value, 1);
        assert!(hooks[0].is_consistent());
    }

    #[test]
    fn inconsistent_after_mid_attempt_mutation() {
        let (store, feed) = ExternalStore::with_feed(1);
        let slot = SyncSlot::new();
        let (_, hooks) = render_read(&slot, &store);
        feed.emit(2);
        assert!(!hooks[0].is_consistent());
    }

    #[test]
    fn commit_records_snapshot_and_subscribes() {
        let (store, _feed) = ExternalStore::with_feed(7);
        let slot = SyncSlot::new();
        let (_, hooks) = render_read(&slot, &store);

        let dirty = Rc::new(Cell::new(false));
        hooks[0].on_commit(&commit_cx(&dirty));

        assert_eq!(slot.committed(), Some(7));
        assert!(slot.is_subscribed());
        assert_eq!(store.listener_count(), 1);
        assert!(!dirty.get());
    }

    #[test]
    fn abandoned_attempt_leaves_no_subscription() {
        let (store, feed) = ExternalStore::with_feed(1);
        let slot = SyncSlot::new();
        let (_, hooks) = render_read(&slot, &store);
        feed.emit(2);
        assert!(!hooks[0].is_consistent());
        // Scheduler drops the hooks without committing.
        drop(hooks);
        assert!(!slot.is_subscribed());
        assert_eq!(store.listener_count(), 0);
        assert_eq!(slot.committed(), None);
    }

    #[test]
    fn subscribe_gap_mutation_invalidates() {
        // Mutation lands after the attempt's read but notification support
        // only arrives with the commit-time subscription; the one-shot
        // re-read must catch it.
        let (store, feed) = ExternalStore::with_feed(0);
        let slot = SyncSlot::new();
        let (_, hooks) = render_read(&slot, &store);

        let dirty = Rc::new(Cell::new(false));
        let cx = commit_cx(&dirty);
        // Simulate the gap: consistency passed earlier, mutation lands now.
        feed.emit(5);
        hooks[0].on_commit(&cx);
        assert!(dirty.get());
    }

    #[test]
    fn notification_with_changed_value_invalidates() {
        let (store, feed) = ExternalStore::with_feed(0);
        let slot = SyncSlot::new();
        let (_, hooks) = render_read(&slot, &store);
        let dirty = Rc::new(Cell::new(false));
        hooks[0].on_commit(&commit_cx(&dirty));
        assert!(!dirty.get());

        feed.emit(1);
        assert!(dirty.get());
    }

    #[test]
    fn equal_value_notification_short_circuits() {
        let (store, feed) = ExternalStore::with_feed(4);
        let slot = SyncSlot::new();
        let (_, hooks) = render_read(&slot, &store);
        let dirty = Rc::new(Cell::new(false));
        hooks[0].on_commit(&commit_cx(&dirty));

        feed.emit(4);
        assert!(!dirty.get());
    }

    #[test]
    fn recommit_reuses_subscription() {
        let (store, feed) = ExternalStore::with_feed(0);
        let slot = SyncSlot::new();
        let dirty = Rc::new(Cell::new(false));

        let (_, hooks) = render_read(&slot, &store);
        hooks[0].on_commit(&commit_cx(&dirty));
        assert_eq!(store.listener_count(), 1);

        feed.emit(1);
        let (_, hooks) = render_read(&slot, &store);
        hooks[0].on_commit(&commit_cx(&dirty));
        assert_eq!(store.listener_count(), 1);
        assert_eq!(slot.committed(), Some(1));
    }

    #[test]
    fn stale_store_notification_is_ignored() {
        let (store_a, feed_a) = ExternalStore::with_feed(10);
        let (store_b, _feed_b) = ExternalStore::with_feed(20);
        let slot = SyncSlot::new();
        let dirty = Rc::new(Cell::new(false));

        // Commit against store A; the handler is registered with A.
        let (_, hooks) = render_read(&slot, &store_a);
        hooks[0].on_commit(&commit_cx(&dirty));
        assert_eq!(store_a.listener_count(), 1);

        // A render attempt switches the slot to store B, but is abandoned
        // before commit; A's registration is still live.
        let (_, _hooks_b) = render_read(&slot, &store_b);

        // A notification from the superseded store must not reach the
        // slot's committed state or force a render.
        feed_a.emit(99);
        assert!(!dirty.get());
        assert_eq!(slot.committed(), Some(10));
    }

    #[test]
    fn commit_after_store_switch_resubscribes() {
        let (store_a, feed_a) = ExternalStore::with_feed(10);
        let (store_b, feed_b) = ExternalStore::with_feed(20);
        let slot = SyncSlot::new();
        let dirty = Rc::new(Cell::new(false));

        let (_, hooks) = render_read(&slot, &store_a);
        hooks[0].on_commit(&commit_cx(&dirty));

        let (value, hooks) = render_read(&slot, &store_b);
        assert_eq!(value, 20);
        hooks[0].on_commit(&commit_cx(&dirty));

        // Old registration dropped, new one live.
        assert_eq!(store_a.listener_count(), 0);
        assert_eq!(store_b.listener_count(), 1);
        assert_eq!(slot.committed(), Some(20));

        dirty.set(false);
        feed_a.emit(11);
        assert!(!dirty.get());
        feed_b.emit(21);
        assert!(dirty.get());
    }

    #[test]
    fn dropping_slot_unsubscribes() {
        let (store, feed) = ExternalStore::with_feed(0);
        let slot = SyncSlot::new();
        let dirty = Rc::new(Cell::new(false));
        let (_, hooks) = render_read(&slot, &store);
        hooks[0].on_commit(&commit_cx(&dirty));
        assert_eq!(store.listener_count(), 1);

        drop(hooks);
        drop(slot);
        assert_eq!(store.listener_count(), 0);
        feed.emit(1);
        assert!(!dirty.get());
    }

    #[test]
    fn direct_slot_is_always_consistent() {
        let (store, feed) = ExternalStore::with_feed(1);
        let slot = DirectSlot::new();
        let mut hooks: Vec<Rc<dyn PassHook>> = Vec::new();
        let mut cx = RenderCx::new(&mut hooks, 0);
        assert_eq!(slot.read(&store, &mut cx), 1);
        feed.emit(2);
        assert!(hooks[0].is_consistent());
    }

    #[test]
    fn direct_slot_subscribes_for_refresh_only() {
        let (store, feed) = ExternalStore::with_feed(1);
        let slot = DirectSlot::new();
        let dirty = Rc::new(Cell::new(false));
        let mut hooks: Vec<Rc<dyn PassHook>> = Vec::new();
        let mut cx = RenderCx::new(&mut hooks, 0);
        let _ = slot.read(&store, &mut cx);
        hooks[0].on_commit(&commit_cx(&dirty));
        assert!(slot.is_subscribed());

        // Even an equal value refreshes: no short-circuit on this path.
        feed.emit(1);
        assert!(dirty.get());
    }
}
