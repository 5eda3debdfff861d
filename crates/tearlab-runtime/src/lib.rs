#![forbid(unsafe_code)]

//! Render-attempt scheduling and store accessors for tearlab.
//!
//! This crate models the part of a declarative UI framework that matters
//! for the tearing hazard: render attempts that can be interleaved with
//! external mutations, abandoned when a pre-commit check detects a stale
//! read, and committed otherwise. It provides:
//!
//! - [`Scheduler`]: a deterministic, single-threaded stand-in for the host
//!   framework's interruptible/blocking render passes.
//! - [`SyncSlot`]: the synchronized accessor — a store read that can never
//!   contribute a stale value to a committed frame.
//! - [`DirectSlot`]: the uncoordinated accessor — a raw read with no
//!   consistency protocol, kept for demonstrating the hazard.
//! - [`Component`], [`RenderCx`], [`CommitCx`], [`Invalidator`]: the seam
//!   between the scheduler and what it renders.
//!
//! # Invariants
//!
//! 1. Post-commit effects (subscriptions, the one-shot staleness re-read)
//!    run only for committed passes, exactly once per commit.
//! 2. An abandoned attempt leaves no observable side effect.
//! 3. A value committed through a [`SyncSlot`] equals the store's value at
//!    some instant no earlier than the attempt's read, and any change
//!    arriving before commit forces a discard-and-retry.
//! 4. Equal values (by `PartialEq`) never force a re-render through a
//!    [`SyncSlot`] notification.

pub mod component;
pub mod scheduler;
pub mod slot;

pub use component::{CommitCx, Component, Invalidator, RenderCx};
pub use scheduler::{ComponentId, Priority, Scheduler, SchedulerStats};
pub use slot::{DirectSlot, SyncSlot};
