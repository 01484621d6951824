//! Track acquisition
//!
//! The coordinator never looks inside an acquisition. It asks an [`Acquirer`]
//! for a finite stream of updates and waits for the terminal one.

pub mod command;

pub use command::{CommandAcquirer, CommandSettings};

use std::path::PathBuf;

use futures::stream::BoxStream;
use futures::StreamExt;
use radiosync_common::events::AcquisitionProgress;
use radiosync_common::TrackId;
use uuid::Uuid;

/// One acquisition job
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    /// Queue item the media is for; also used to name the output file
    pub job_id: Uuid,
    pub track_id: TrackId,
}

/// Successfully acquired media
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredMedia {
    pub title: String,
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Update emitted by an acquisition stream
///
/// A stream yields any number of `Progress` updates followed by exactly one
/// `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionUpdate {
    Progress(AcquisitionProgress),
    Completed(AcquiredMedia),
    Failed(String),
}

pub type AcquisitionStream = BoxStream<'static, AcquisitionUpdate>;

/// Turns a track ID into local media
pub trait Acquirer: Send + Sync {
    fn acquire(&self, request: AcquisitionRequest) -> AcquisitionStream;
}

/// Drive a stream to its terminal update, passing progress to `on_progress`
///
/// A stream that ends without a terminal update counts as a failure.
pub async fn run_to_completion<F>(
    mut stream: AcquisitionStream,
    mut on_progress: F,
) -> std::result::Result<AcquiredMedia, String>
where
    F: FnMut(AcquisitionProgress),
{
    while let Some(update) = stream.next().await {
        match update {
            AcquisitionUpdate::Progress(progress) => on_progress(progress),
            AcquisitionUpdate::Completed(media) => return Ok(media),
            AcquisitionUpdate::Failed(reason) => return Err(reason),
        }
    }
    Err("Acquisition ended without a result".to_string())
}
