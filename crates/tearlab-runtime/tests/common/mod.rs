#![forbid(unsafe_code)]
#![allow(dead_code)]

//! Shared probe components for scheduler integration tests.

use std::cell::Cell;
use std::rc::Rc;

use tearlab_runtime::{Component, DirectSlot, RenderCx, SyncSlot};
use tearlab_store::ExternalStore;

/// Renders the store value through the synchronized accessor.
pub struct SyncProbe {
    pub store: ExternalStore<i64>,
    pub slot: SyncSlot<i64>,
}

impl SyncProbe {
    pub fn new(store: &ExternalStore<i64>) -> Box<Self> {
        Box::new(Self {
            store: store.clone(),
            slot: SyncSlot::new(),
        })
    }
}

impl Component for SyncProbe {
    fn render(&mut self, cx: &mut RenderCx<'_>) -> String {
        self.slot.read(&self.store, cx).to_string()
    }
}

/// Renders the store value through the uncoordinated accessor.
pub struct DirectProbe {
    pub store: ExternalStore<i64>,
    pub slot: DirectSlot<i64>,
}

impl DirectProbe {
    pub fn new(store: &ExternalStore<i64>) -> Box<Self> {
        Box::new(Self {
            store: store.clone(),
            slot: DirectSlot::new(),
        })
    }
}

impl Component for DirectProbe {
    fn render(&mut self, cx: &mut RenderCx<'_>) -> String {
        self.slot.read(&self.store, cx).to_string()
    }
}

/// Reads from one of two stores depending on a shared flag; used to test
/// the staleness guard across store switches.
pub struct SwitchingProbe {
    pub primary: ExternalStore<i64>,
    pub secondary: ExternalStore<i64>,
    pub use_secondary: Rc<Cell<bool>>,
    pub slot: SyncSlot<i64>,
}

impl Component for SwitchingProbe {
    fn render(&mut self, cx: &mut RenderCx<'_>) -> String {
        let store = if self.use_secondary.get() {
            &self.secondary
        } else {
            &self.primary
        };
        self.slot.read(store, cx).to_string()
    }
}

/// True when every line in the frame is identical.
pub fn frame_is_uniform(frame: &[String]) -> bool {
    frame.windows(2).all(|pair| pair[0] == pair[1])
}
