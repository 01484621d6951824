//! Playback coordination
//!
//! Queue, current-track slot, phase machine and timers for the shared
//! timeline.

pub mod coordinator;
pub mod queue;
pub mod timers;
pub mod types;

pub use coordinator::{CoordinatorSettings, PlaybackCoordinator};
pub use queue::PlaybackQueue;
pub use timers::{TimerKind, TimerSlot};
pub use types::{AcquisitionState, QueueItem};
