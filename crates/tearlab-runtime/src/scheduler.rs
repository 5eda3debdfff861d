#![forbid(unsafe_code)]

//! Deterministic single-threaded render scheduler.
//!
//! Stands in for the host rendering framework: it decides when render
//! attempts begin, are abandoned, or are committed. The "concurrency" it
//! models is re-entrant interleaving of render work with external
//! mutations, not multi-threading — everything runs to completion on one
//! cooperative thread.
//!
//! # Pass semantics
//!
//! - An **interruptible** pass renders components in mount order and, after
//!   each component, delivers up to a fixed budget of queued external
//!   events. These delivery points are the widened race window in which
//!   later components can observe newer store values than earlier ones.
//! - A **blocking** pass delivers no events until after commit and
//!   therefore cannot be torn.
//! - At the end of every pass, each hook registered during rendering is
//!   asked whether its read is still consistent. Any mismatch abandons the
//!   pass: outputs are discarded, no post-commit effect runs, and the
//!   scheduler retries with a blocking pass.
//! - Post-commit hooks run exactly once per committed pass.
//!
//! # Invariants
//!
//! 1. An abandoned attempt leaves no observable side effect; in particular,
//!    no subscription is established for it.
//! 2. A blocking retry always commits: no mutation can interleave with it.
//! 3. `run_until_idle` returns only when no events are queued and no render
//!    is pending.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::component::{CommitCx, Component, Invalidator, RenderCx};
use crate::slot::PassHook;

/// Identity of a mounted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

/// How urgently a requested render should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Low priority: the pass runs on the next `run_until_idle` and may be
    /// interrupted by queued external events.
    Deferred,
    /// Run one blocking, non-interruptible pass immediately.
    Immediate,
}

/// Counters describing scheduler activity. All monotonically increasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Render attempts started, abandoned ones included.
    pub attempts: u64,
    /// Attempts whose output became the committed frame.
    pub commits: u64,
    /// Attempts discarded by the pre-commit consistency check.
    pub abandoned: u64,
    /// Blocking retries forced by abandoned interruptible passes.
    pub forced_syncs: u64,
    /// External events delivered, mid-pass or between passes.
    pub events_delivered: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassOutcome {
    Committed,
    Abandoned,
}

struct Mounted {
    id: ComponentId,
    component: Box<dyn Component>,
}

/// The scheduler. Owns mounted components, the queue of pending external
/// events, and the committed frame.
pub struct Scheduler {
    components: Vec<Mounted>,
    next_component_id: u64,
    events: VecDeque<Box<dyn FnOnce()>>,
    dirty: Rc<Cell<bool>>,
    frame: Vec<String>,
    trace: Vec<Vec<String>>,
    stats: SchedulerStats,
    interrupt_budget: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("components", &self.components.len())
            .field("pending_events", &self.events.len())
            .field("dirty", &self.dirty.get())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            next_component_id: 0,
            events: VecDeque::new(),
            dirty: Rc::new(Cell::new(false)),
            frame: Vec::new(),
            trace: Vec::new(),
            stats: SchedulerStats::default(),
            interrupt_budget: 1,
        }
    }

    /// Set how many queued events one interruption window delivers.
    #[must_use]
    pub fn with_interrupt_budget(mut self, budget: usize) -> Self {
        self.interrupt_budget = budget.max(1);
        self
    }

    /// Mount a component at the end of the render order.
    pub fn mount(&mut self, component: Box<dyn Component>) -> ComponentId {
        let id = ComponentId(self.next_component_id);
        self.next_component_id += 1;
        self.components.push(Mounted { id, component });
        self.dirty.set(true);
        id
    }

    /// Remove a component. Dropping it drops its slots and therefore their
    /// subscriptions (exactly-once unsubscription on teardown).
    ///
    /// Returns false if the id is not mounted.
    pub fn unmount(&mut self, id: ComponentId) -> bool {
        let before = self.components.len();
        self.components.retain(|mounted| mounted.id != id);
        let removed = self.components.len() != before;
        if removed {
            self.dirty.set(true);
        }
        removed
    }

    /// Queue an external mutation (e.g. a pointer-move reaching an event
    /// feed). Delivery happens at the scheduler's interruption points or
    /// between passes, never mid-component.
    pub fn enqueue_event(&mut self, event: impl FnOnce() + 'static) {
        self.events.push_back(Box::new(event));
    }

    /// Request a render.
    pub fn request_render(&mut self, priority: Priority) {
        match priority {
            Priority::Deferred => self.dirty.set(true),
            Priority::Immediate => {
                // Non-interruptible: queued events stay queued until after
                // this commit.
                let outcome = self.render_pass(false);
                debug_assert_eq!(outcome, PassOutcome::Committed);
            }
        }
    }

    /// Deliver queued events and run render passes until no events are
    /// pending and nothing is dirty.
    pub fn run_until_idle(&mut self) {
        loop {
            if self.dirty.get() {
                if self.render_pass(true) == PassOutcome::Abandoned {
                    self.stats.forced_syncs += 1;
                    let outcome = self.render_pass(false);
                    debug_assert_eq!(outcome, PassOutcome::Committed);
                }
                continue;
            }
            if self.deliver_pending(1) == 0 {
                break;
            }
        }
    }

    /// The latest committed frame: one line per component, in mount order.
    #[must_use]
    pub fn frame(&self) -> &[String] {
        &self.frame
    }

    /// Every frame committed since the last [`clear_committed_frames`]
    /// call, oldest first. Transient frames matter here: a torn frame that
    /// is later repaired by a refresh pass was still observable output.
    ///
    /// [`clear_committed_frames`]: Self::clear_committed_frames
    #[must_use]
    pub fn committed_frames(&self) -> &[Vec<String>] {
        &self.trace
    }

    /// Discard the recorded commit history.
    pub fn clear_committed_frames(&mut self) {
        self.trace.clear();
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Number of external events not yet delivered.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Handle components can use to request a render from outside a pass.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        Invalidator::new(Rc::clone(&self.dirty))
    }

    fn deliver_pending(&mut self, max: usize) -> usize {
        let mut delivered = 0;
        while delivered < max {
            let Some(event) = self.events.pop_front() else {
                break;
            };
            event();
            delivered += 1;
        }
        self.stats.events_delivered += delivered as u64;
        delivered
    }

    fn render_pass(&mut self, interruptible: bool) -> PassOutcome {
        self.stats.attempts += 1;
        let attempt = self.stats.attempts;
        trace!(attempt, interruptible, "render attempt started");
        self.dirty.set(false);

        let mut hooks: Vec<Rc<dyn PassHook>> = Vec::new();
        let mut outputs = Vec::with_capacity(self.components.len());
        for idx in 0..self.components.len() {
            {
                let mut cx = RenderCx::new(&mut hooks, attempt);
                let line = self.components[idx].component.render(&mut cx);
                outputs.push(line);
            }
            if interruptible {
                let delivered = self.deliver_pending(self.interrupt_budget);
                if delivered > 0 {
                    trace!(attempt, delivered, after_component = idx, "interrupted");
                }
            }
        }

        if hooks.iter().any(|hook| !hook.is_consistent()) {
            self.stats.abandoned += 1;
            debug!(attempt, "render attempt abandoned: stale read before commit");
            return PassOutcome::Abandoned;
        }

        self.trace.push(outputs.clone());
        self.frame = outputs;
        self.stats.commits += 1;
        trace!(attempt, "render attempt committed");

        let cx = CommitCx::new(Invalidator::new(Rc::clone(&self.dirty)));
        for hook in &hooks {
            hook.on_commit(&cx);
        }
        if self.dirty.get() {
            debug!(attempt, "post-commit re-read detected staleness");
        }
        PassOutcome::Committed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
