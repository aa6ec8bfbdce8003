// src/watch/debouncer.rs

//! Pure debouncer: collects change events until the quiescence window has
//! elapsed and coalesces bursts for the same path.
//!
//! Time is passed in explicitly so the rules can be tested without a clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::types::{ChangeBatch, ChangeEvent, ChangeOp};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    /// Observation order; `None` marks an entry that was coalesced away.
    slots: Vec<Option<ChangeEvent>>,
    /// Path -> index into `slots` for the live entry of that path.
    index: HashMap<String, usize>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Vec::new(),
            index: HashMap::new(),
            last_event: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event observed at `now`, merging it with any pending event
    /// for the same path.
    pub fn push(&mut self, event: ChangeEvent, now: Instant) {
        self.last_event = Some(now);

        let Some(&slot) = self.index.get(&event.path) else {
            self.index.insert(event.path.clone(), self.slots.len());
            self.slots.push(Some(event));
            return;
        };

        let Some(existing) = self.slots[slot].as_mut() else {
            return;
        };

        match coalesce(existing.op, event.op) {
            Some(op) => {
                if op != existing.op {
                    trace!(path = %event.path, from = existing.op.label(), to = op.label(), "coalesced change");
                }
                existing.op = op;
            }
            None => {
                trace!(path = %event.path, "created and deleted within one window; dropping");
                self.slots[slot] = None;
                self.index.remove(&event.path);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Instant at which the pending batch becomes ready, if anything is pending.
    pub fn deadline(&self) -> Option<Instant> {
        if self.is_empty() {
            return None;
        }
        self.last_event.map(|t| t + self.window)
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        matches!(self.deadline(), Some(deadline) if now >= deadline)
    }

    /// Take the pending batch if the window has elapsed since the last event.
    pub fn take_if_ready(&mut self, now: Instant) -> Option<ChangeBatch> {
        if !self.is_ready(now) {
            return None;
        }
        Some(self.take())
    }

    /// Take whatever is pending, ready or not.
    pub fn take(&mut self) -> ChangeBatch {
        self.index.clear();
        self.last_event = None;
        let events: Vec<ChangeEvent> = std::mem::take(&mut self.slots)
            .into_iter()
            .flatten()
            .collect();
        ChangeBatch::new(events)
    }
}

/// Merge a pending op with a newly observed op for the same path.
///
/// Returns `None` when the two cancel out.
fn coalesce(existing: ChangeOp, incoming: ChangeOp) -> Option<ChangeOp> {
    use ChangeOp::*;

    match (existing, incoming) {
        // Atomic save: the file was replaced.
        (Delete, Create | Update) => Some(Update),
        (Update, Delete) => Some(Delete),
        (Create, Delete) => None,
        (Create, Update | Create) => Some(Create),
        (Update, Create | Update) => Some(Update),
        (Delete, Delete) => Some(Delete),
    }
}
