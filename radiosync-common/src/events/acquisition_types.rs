//! Acquisition progress types
//!
//! Progress reported while a track is being fetched. Forwarded verbatim to
//! observers inside `RadioEvent::DownloadProgress`.

use serde::{Deserialize, Serialize};

/// Stage of an acquisition attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    /// Bytes are being transferred
    Download,
    /// Transfer done, converting to the playable format
    Processing,
}

/// Single progress update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionProgress {
    pub stage: ProgressStage,
    /// 0-100
    pub percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AcquisitionProgress {
    pub fn download(percentage: f64) -> Self {
        Self {
            stage: ProgressStage::Download,
            percentage: percentage.round().clamp(0.0, 100.0) as u8,
            detail: None,
        }
    }

    pub fn processing(detail: impl Into<String>) -> Self {
        Self {
            stage: ProgressStage::Processing,
            percentage: 95,
            detail: Some(detail.into()),
        }
    }
}
