//! Queue item types owned by the coordinator

use radiosync_common::events::QueueItemInfo;
use radiosync_common::TrackId;
use uuid::Uuid;

use crate::acquisition::AcquiredMedia;

/// Where an item's acquisition stands
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AcquisitionState {
    /// Not acquired yet (possibly in flight)
    #[default]
    Pending,
    Resolved(AcquiredMedia),
    /// Acquisition failed; the reason is replayed when the item comes up
    Failed(String),
}

/// One requested track
///
/// Lives in exactly one place: the queue or the current-track slot.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: Uuid,
    pub track_id: TrackId,
    pub added_at_ms: i64,
    pub state: AcquisitionState,
    /// An acquisition task for this item is still running
    pub in_flight: bool,
}

impl QueueItem {
    pub fn new(track_id: TrackId, added_at_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            track_id,
            added_at_ms,
            state: AcquisitionState::Pending,
            in_flight: false,
        }
    }

    pub fn media(&self) -> Option<&AcquiredMedia> {
        match &self.state {
            AcquisitionState::Resolved(media) => Some(media),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.media().map(|m| m.title.as_str())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, AcquisitionState::Resolved(_))
    }

    pub fn to_info(&self) -> QueueItemInfo {
        QueueItemInfo {
            id: self.id,
            track_id: self.track_id.clone(),
            title: self.title().map(str::to_string),
            downloaded: self.is_resolved(),
            download_failed: matches!(self.state, AcquisitionState::Failed(_)),
        }
    }
}
