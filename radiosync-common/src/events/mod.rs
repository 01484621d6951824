//! Event types for the radio sync event system
//!
//! Provides the closed set of broadcast events and the EventBus that fans them
//! out to every connected observer.

// Sub-modules (supporting types)
mod acquisition_types;
mod playback_types;
mod queue_types;

pub use acquisition_types::{AcquisitionProgress, ProgressStage};
pub use playback_types::{NowPlayingInfo, Phase, StateSnapshot};
pub use queue_types::{CancelResult, QueueItemInfo, Rejection, RequestResult};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::TrackId;

/// Radio sync event types
///
/// Every outbound broadcast is one of these variants. Serialized with a `type`
/// tag and camelCase fields for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RadioEvent {
    /// Acquisition started for an item (current or queued)
    Downloading { id: Uuid, track_id: TrackId },

    /// Progress of an in-flight acquisition
    DownloadProgress {
        id: Uuid,
        track_id: TrackId,
        #[serde(flatten)]
        progress: AcquisitionProgress,
    },

    /// Background acquisition finished for a queued item
    QueueItemDownloaded {
        id: Uuid,
        track_id: TrackId,
        title: String,
    },

    /// Current track is ready; clients load media and arm for `start_epoch_ms`
    Prepare {
        id: Uuid,
        title: String,
        track_id: TrackId,
        media_locator: String,
        duration_secs: f64,
        start_epoch_ms: i64,
    },

    /// Start instant reached
    Start { id: Uuid, start_epoch_ms: i64 },

    /// Current track finished playing
    Ended { id: Uuid },

    /// Track removed by request (current or queued)
    SongCanceled { id: Uuid, title: String },

    /// Full queue contents after any queue change
    QueueUpdated { queue: Vec<QueueItemInfo> },

    /// Acquisition failure or other problem tied to an item
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
    },

    /// Periodic server clock sample
    #[serde(rename = "timesync")]
    TimeSync { server_epoch_ms: i64 },

    /// Snapshot sent to a single newly connected observer
    NowPlaying {
        #[serde(flatten)]
        snapshot: StateSnapshot,
    },
}

impl RadioEvent {
    /// Wire name of the event, used as the SSE `event:` field
    pub fn event_name(&self) -> &'static str {
        match self {
            RadioEvent::Downloading { .. } => "downloading",
            RadioEvent::DownloadProgress { .. } => "downloadProgress",
            RadioEvent::QueueItemDownloaded { .. } => "queueItemDownloaded",
            RadioEvent::Prepare { .. } => "prepare",
            RadioEvent::Start { .. } => "start",
            RadioEvent::Ended { .. } => "ended",
            RadioEvent::SongCanceled { .. } => "songCanceled",
            RadioEvent::QueueUpdated { .. } => "queueUpdated",
            RadioEvent::Error { .. } => "error",
            RadioEvent::TimeSync { .. } => "timesync",
            RadioEvent::NowPlaying { .. } => "nowPlaying",
        }
    }

    /// Item the event refers to, if any
    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            RadioEvent::Downloading { id, .. }
            | RadioEvent::DownloadProgress { id, .. }
            | RadioEvent::QueueItemDownloaded { id, .. }
            | RadioEvent::Prepare { id, .. }
            | RadioEvent::Start { id, .. }
            | RadioEvent::Ended { id }
            | RadioEvent::SongCanceled { id, .. } => Some(*id),
            RadioEvent::Error { id, .. } => *id,
            RadioEvent::QueueUpdated { .. }
            | RadioEvent::TimeSync { .. }
            | RadioEvent::NowPlaying { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the coordinator)
/// - Multiple concurrent subscribers
/// - Lagging subscribers lose the oldest events instead of stalling others
///
/// # Examples
///
/// ```
/// use radiosync_common::events::{EventBus, RadioEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(RadioEvent::TimeSync { server_epoch_ms: 1_700_000_000_000 });
/// assert_eq!(rx.try_recv().unwrap().event_name(), "timesync");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RadioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RadioEvent,
    ) -> Result<usize, broadcast::error::SendError<RadioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RadioEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
