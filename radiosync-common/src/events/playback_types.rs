//! Playback-related type definitions
//!
//! Global phase of the shared timeline and the point-in-time snapshot handed
//! to newly connected observers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue_types::QueueItemInfo;
use crate::TrackId;

/// Global playback phase
///
/// `Idle` iff the current-track slot is empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing current, queue empty
    #[default]
    Idle,
    /// Current track is being acquired
    Downloading,
    /// Start time announced, waiting for it to arrive
    Prepared,
    /// Start time has passed, track is on air
    Playing,
}

impl Phase {
    /// Whether a track occupies the current slot in this phase
    pub fn has_current_track(self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Downloading => write!(f, "downloading"),
            Phase::Prepared => write!(f, "prepared"),
            Phase::Playing => write!(f, "playing"),
        }
    }
}

/// Current-track information exposed to observers
///
/// Fields that only exist after acquisition (`media_locator`, `duration_secs`,
/// `start_epoch_ms`) are `None` while the track is still downloading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingInfo {
    pub id: Uuid,
    pub title: Option<String>,
    pub track_id: TrackId,
    pub media_locator: Option<String>,
    pub duration_secs: Option<f64>,
    pub start_epoch_ms: Option<i64>,
}

/// Full state needed to render the timeline without replaying history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub phase: Phase,
    pub queue: Vec<QueueItemInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<NowPlayingInfo>,
}

impl StateSnapshot {
    /// Snapshot of a server with nothing current and nothing queued
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            queue: Vec::new(),
            now_playing: None,
        }
    }
}
