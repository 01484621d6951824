//! FIFO of tracks waiting behind the current one

use std::collections::VecDeque;

use radiosync_common::events::QueueItemInfo;
use radiosync_common::TrackId;
use uuid::Uuid;

use super::types::QueueItem;

#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: VecDeque<QueueItem>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push_back(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    pub fn contains_track(&self, track_id: &TrackId) -> bool {
        self.items.iter().any(|item| &item.track_id == track_id)
    }

    /// Zero-based index of the item with `id`
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Splice out the item with `id`, preserving the order of the rest
    pub fn remove(&mut self, id: Uuid) -> Option<QueueItem> {
        let index = self.position(id)?;
        self.items.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn to_info(&self) -> Vec<QueueItemInfo> {
        self.items.iter().map(QueueItem::to_info).collect()
    }
}
