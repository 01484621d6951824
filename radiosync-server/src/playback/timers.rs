//! Coordinator timer slot
//!
//! At most one timer is armed at a time: the start timer while prepared, the
//! end timer while playing. Every arm gets a fresh generation number; a timer
//! task that wakes up with a generation the slot no longer holds must do
//! nothing.

use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires at the announced start instant
    Start,
    /// Fires when the current track's duration has elapsed
    End,
}

#[derive(Debug)]
struct ArmedTimer {
    kind: TimerKind,
    item_id: Uuid,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: u64,
    armed: Option<ArmedTimer>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the generation for the next `arm`
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Install a spawned timer task, aborting whatever was armed before
    pub fn arm(&mut self, kind: TimerKind, item_id: Uuid, generation: u64, handle: JoinHandle<()>) {
        self.disarm();
        self.armed = Some(ArmedTimer {
            kind,
            item_id,
            generation,
            handle,
        });
    }

    /// Abort the armed timer and invalidate its generation
    pub fn disarm(&mut self) {
        if let Some(timer) = self.armed.take() {
            timer.handle.abort();
        }
        self.generation += 1;
    }

    /// Called by a timer task that has fired
    ///
    /// Returns true if `generation` is still the armed one, clearing the slot
    /// without aborting (the caller is that task). Returns false for stale
    /// timers.
    pub fn release(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some(timer) if timer.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed_kind(&self) -> Option<TimerKind> {
        self.armed.as_ref().map(|t| t.kind)
    }

    pub fn armed_item(&self) -> Option<Uuid> {
        self.armed.as_ref().map(|t| t.item_id)
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(timer) = self.armed.take() {
            timer.handle.abort();
        }
    }
}
