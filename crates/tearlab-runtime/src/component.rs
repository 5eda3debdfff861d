#![forbid(unsafe_code)]

//! The component seam: what the scheduler renders, and the contexts it
//! hands out during a render attempt and after a commit.

use std::cell::Cell;
use std::rc::Rc;

use crate::slot::PassHook;

/// A unit the scheduler renders. One render attempt produces one line of
/// output (the demo's "UI").
///
/// `render` may be called repeatedly for attempts that are later abandoned;
/// it must not perform observable side effects of its own. Reads that need
/// commit-time consistency go through
/// [`SyncSlot::read`](crate::slot::SyncSlot::read).
pub trait Component {
    /// Compute this component's output from current snapshots.
    fn render(&mut self, cx: &mut RenderCx<'_>) -> String;
}

/// Per-attempt context handed to [`Component::render`].
///
/// Carries the pass's hook registry: slots register themselves here so the
/// scheduler can run the pre-commit consistency check and the post-commit
/// subscribe/re-read effects.
pub struct RenderCx<'a> {
    hooks: &'a mut Vec<Rc<dyn PassHook>>,
    attempt: u64,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(hooks: &'a mut Vec<Rc<dyn PassHook>>, attempt: u64) -> Self {
        Self { hooks, attempt }
    }

    pub(crate) fn register(&mut self, hook: Rc<dyn PassHook>) {
        self.hooks.push(hook);
    }

    /// Index of the render attempt this context belongs to. Attempts are
    /// numbered across the scheduler's lifetime, abandoned ones included.
    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

/// Post-commit context. Runs exactly once per successful commit, never for
/// an abandoned attempt.
pub struct CommitCx {
    invalidator: Invalidator,
}

impl CommitCx {
    pub(crate) fn new(invalidator: Invalidator) -> Self {
        Self { invalidator }
    }

    /// Handle for scheduling a new render pass.
    #[must_use]
    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }
}

/// Marks the scheduler dirty so a new render pass runs.
///
/// This is the re-render/invalidation primitive the accessor protocol is an
/// adapter over. Cloneable; all clones reach the same scheduler.
#[derive(Clone)]
pub struct Invalidator {
    dirty: Rc<Cell<bool>>,
}

impl Invalidator {
    pub(crate) fn new(dirty: Rc<Cell<bool>>) -> Self {
        Self { dirty }
    }

    /// Request a new render pass.
    pub fn invalidate(&self) {
        self.dirty.set(true);
    }
}

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator")
            .field("dirty", &self.dirty.get())
            .finish()
    }
}
