//! Queue-related type definitions
//!
//! Queue entries as observers see them, plus the structured results returned
//! to the requester of an admission or a cancellation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TrackId;

/// Queue entry information for broadcasts and snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemInfo {
    pub id: Uuid,
    pub track_id: TrackId,
    /// Resolved title, `None` until background acquisition succeeds
    pub title: Option<String>,
    pub downloaded: bool,
    pub download_failed: bool,
}

/// Why an admission request was turned away
///
/// Rejections are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Queue already holds the maximum number of pending items
    QueueFull,
    /// Track is already current or queued
    Duplicate,
}

impl Rejection {
    /// Reason string surfaced to the requesting client
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::QueueFull => "Queue is full",
            Rejection::Duplicate => "Duplicate track in queue",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Result of a track request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestResult {
    pub accepted: bool,
    /// 0 = became current immediately, n = n-th in the queue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RequestResult {
    pub fn accepted(position: usize, id: Uuid) -> Self {
        Self {
            accepted: true,
            position: Some(position),
            id: Some(id),
            reason: None,
        }
    }

    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            accepted: false,
            position: None,
            id: None,
            reason: Some(rejection.reason().to_string()),
        }
    }
}

/// Result of a cancellation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelResult {
    pub success: bool,
    pub message: String,
}

impl CancelResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
