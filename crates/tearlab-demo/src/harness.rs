#![forbid(unsafe_code)]

//! Demonstration harness: two panels of three consumers each, driven by
//! identical pointer-move scripts.
//!
//! The *direct* panel reads the store through the uncoordinated accessor
//! and commits torn frames when moves land between its consumers' reads.
//! The *sync* panel uses the synchronized protocol and never does — at the
//! cost of abandoned render attempts, which the report counts.
//!
//! Both panels share one toggle semantics: a boolean flipped through
//! either a low-priority interruptible render request or an immediate
//! blocking one. Trials alternate between the two trigger paths.

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;

use tracing::{debug, info};
use web_time::{Duration, Instant};

use tearlab_runtime::{Component, DirectSlot, Priority, RenderCx, Scheduler, SyncSlot};
use tearlab_store::{EventFeed, ExternalStore};

use crate::cli::DemoConfig;
use crate::error::{DemoError, Result};

enum Accessor {
    Direct(DirectSlot<i64>),
    Sync(SyncSlot<i64>),
}

/// One consumer: reads the pointer position, then stalls for the
/// configured delay before producing its line.
struct SlowReadout {
    label: String,
    store: ExternalStore<i64>,
    accessor: Accessor,
    toggle: Rc<Cell<bool>>,
    delay: Duration,
}

impl Component for SlowReadout {
    fn render(&mut self, cx: &mut RenderCx<'_>) -> String {
        let x = match &self.accessor {
            Accessor::Direct(slot) => slot.read(&self.store, cx),
            Accessor::Sync(slot) => slot.read(&self.store, cx),
        };
        spin(self.delay);
        let state = if self.toggle.get() { "on" } else { "off" };
        format!("{} x={x} [{state}]", self.label)
    }
}

/// Deliberate, non-yielding delay widening the demonstration's race
/// window. In this single-threaded model the actual interruption points
/// are the scheduler's event-delivery windows; the spin mirrors the
/// blocking render of the original demonstration and keeps frame pacing
/// visible at human timescales.
fn spin(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    let start = Instant::now();
    while start.elapsed() < delay {
        std::hint::spin_loop();
    }
}

/// One panel: a scheduler with three consumers of a single accessor kind
/// over its own store and pointer feed.
struct Panel {
    name: &'static str,
    scheduler: Scheduler,
    feed: EventFeed<i64>,
    toggle: Rc<Cell<bool>>,
}

impl Panel {
    fn new(name: &'static str, sync: bool, config: &DemoConfig) -> Self {
        let (store, feed) = ExternalStore::with_feed(0i64);
        let toggle = Rc::new(Cell::new(false));
        let delay = Duration::from_micros(config.render_delay_us);
        let mut scheduler = Scheduler::new();
        for i in 0..3 {
            let accessor = if sync {
                Accessor::Sync(SyncSlot::new())
            } else {
                Accessor::Direct(DirectSlot::new())
            };
            scheduler.mount(Box::new(SlowReadout {
                label: format!("{name}#{i}"),
                store: store.clone(),
                accessor,
                toggle: Rc::clone(&toggle),
                delay,
            }));
        }
        // Initial commit; establishes the post-commit subscriptions.
        scheduler.run_until_idle();
        scheduler.clear_committed_frames();
        Self {
            name,
            scheduler,
            feed,
            toggle,
        }
    }

    fn queue_moves(&mut self, positions: &[i64]) {
        for &x in positions {
            let feed = self.feed.clone();
            self.scheduler.enqueue_event(move || feed.emit(x));
        }
    }

    /// Flip the shared toggle through the given scheduling path, then run
    /// to idle.
    fn trigger(&mut self, priority: Priority) {
        self.toggle.set(!self.toggle.get());
        self.scheduler.request_render(priority);
        self.scheduler.run_until_idle();
    }

    fn take_frames(&mut self) -> Vec<Vec<String>> {
        let frames = self.scheduler.committed_frames().to_vec();
        self.scheduler.clear_committed_frames();
        frames
    }
}

/// Aggregate outcome of a demo run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub trials: usize,
    pub direct_torn_frames: usize,
    pub direct_commits: u64,
    pub sync_commits: u64,
    pub sync_abandoned: u64,
    pub sync_forced_retries: u64,
}

impl std::fmt::Display for DemoReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "trials:                 {}", self.trials)?;
        writeln!(
            f,
            "direct panel:           {} commits, {} torn frames",
            self.direct_commits, self.direct_torn_frames
        )?;
        writeln!(
            f,
            "sync panel:             {} commits, 0 torn frames",
            self.sync_commits
        )?;
        write!(
            f,
            "sync retries:           {} attempts abandoned, {} blocking retries",
            self.sync_abandoned, self.sync_forced_retries
        )
    }
}

/// Extract the pointer position from a readout line.
fn parse_x(line: &str) -> Option<i64> {
    let rest = &line[line.find("x=")? + 2..];
    let end = rest.find(' ').unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// A frame is torn when its consumers committed different positions.
fn frame_is_torn(frame: &[String]) -> bool {
    let mut positions = frame.iter().map(|line| parse_x(line));
    let Some(first) = positions.next() else {
        return false;
    };
    positions.any(|x| x != first)
}

/// Run the demonstration, writing frames to `out`.
pub fn run(config: &DemoConfig, out: &mut impl Write) -> Result<DemoReport> {
    let mut direct = Panel::new("direct", false, config);
    let mut sync = Panel::new("sync", true, config);
    let mut report = DemoReport {
        trials: config.trials,
        ..DemoReport::default()
    };

    for trial in 0..config.trials {
        // Identical pointer script for both panels; positions advance so
        // every move is a real change.
        let base = (trial * config.moves) as i64;
        let positions: Vec<i64> = (1..=config.moves as i64).map(|m| base + m).collect();
        direct.queue_moves(&positions);
        sync.queue_moves(&positions);

        // Alternate the two trigger paths for the shared toggle.
        let priority = if trial % 2 == 0 {
            Priority::Deferred
        } else {
            Priority::Immediate
        };
        debug!(trial, ?priority, moves = positions.len(), "trial start");
        direct.trigger(priority);
        sync.trigger(priority);

        for panel in [&mut direct, &mut sync] {
            let name = panel.name;
            for frame in panel.take_frames() {
                let torn = frame_is_torn(&frame);
                if torn {
                    if name == "sync" {
                        return Err(DemoError::SyncTear { trial, frame });
                    }
                    report.direct_torn_frames += 1;
                    info!(trial, panel = name, ?frame, "torn frame committed");
                }
                if !config.quiet {
                    let marker = if torn { "  <-- TORN" } else { "" };
                    writeln!(out, "[trial {trial}] {name}: {}{marker}", frame.join(" | "))?;
                }
            }
        }
    }

    report.direct_commits = direct.scheduler.stats().commits;
    report.sync_commits = sync.scheduler.stats().commits;
    report.sync_abandoned = sync.scheduler.stats().abandoned;
    report.sync_forced_retries = sync.scheduler.stats().forced_syncs;
    Ok(report)
}
