//! Scripted acquisition backend
//!
//! `Immediate` completes every acquisition as soon as it is polled (or fails
//! it, for tracks marked with `fail_track`). `Manual` holds each acquisition
//! open until the test calls `complete` or `fail`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use futures::stream::{self, StreamExt};
use radiosync_common::events::AcquisitionProgress;
use radiosync_common::TrackId;
use radiosync_server::acquisition::{
    AcquiredMedia, AcquisitionRequest, AcquisitionStream, AcquisitionUpdate, Acquirer,
};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    Immediate,
    Manual,
}

pub struct MockAcquirer {
    media_dir: PathBuf,
    duration_secs: f64,
    mode: AcquireMode,
    calls: Mutex<Vec<TrackId>>,
    failing: Mutex<HashSet<TrackId>>,
    pending: Mutex<HashMap<TrackId, (Uuid, oneshot::Sender<AcquisitionUpdate>)>>,
}

impl MockAcquirer {
    pub fn new(media_dir: PathBuf, duration_secs: f64, mode: AcquireMode) -> Self {
        Self {
            media_dir,
            duration_secs,
            mode,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Immediate mode: make acquisitions of `track` fail
    pub fn fail_track(&self, track: &TrackId) {
        self.failing.lock().unwrap().insert(track.clone());
    }

    pub fn calls_for(&self, track: &TrackId) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| *t == track).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_pending(&self, track: &TrackId) -> bool {
        self.pending.lock().unwrap().contains_key(track)
    }

    /// Manual mode: finish the open acquisition of `track` successfully
    ///
    /// Returns the path of the file that was "downloaded".
    pub fn complete(&self, track: &TrackId) -> PathBuf {
        let (job_id, tx) = self
            .pending
            .lock()
            .unwrap()
            .remove(track)
            .unwrap_or_else(|| panic!("no pending acquisition for {}", track));
        let media = self.write_media(job_id, track);
        let path = media.path.clone();
        let _ = tx.send(AcquisitionUpdate::Completed(media));
        path
    }

    /// Manual mode: fail the open acquisition of `track`
    pub fn fail(&self, track: &TrackId, reason: &str) {
        let (_, tx) = self
            .pending
            .lock()
            .unwrap()
            .remove(track)
            .unwrap_or_else(|| panic!("no pending acquisition for {}", track));
        let _ = tx.send(AcquisitionUpdate::Failed(reason.to_string()));
    }

    fn write_media(&self, job_id: Uuid, track: &TrackId) -> AcquiredMedia {
        let path = self.media_dir.join(format!("{}-{}.m4a", job_id, track));
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        AcquiredMedia {
            title: format!("Title {}", track),
            path,
            duration_secs: self.duration_secs,
        }
    }
}

impl Acquirer for MockAcquirer {
    fn acquire(&self, request: AcquisitionRequest) -> AcquisitionStream {
        self.calls.lock().unwrap().push(request.track_id.clone());

        match self.mode {
            AcquireMode::Immediate => {
                let terminal = if self.failing.lock().unwrap().contains(&request.track_id) {
                    AcquisitionUpdate::Failed("mock failure".to_string())
                } else {
                    AcquisitionUpdate::Completed(self.write_media(request.job_id, &request.track_id))
                };
                stream::iter(vec![
                    AcquisitionUpdate::Progress(AcquisitionProgress::download(50.0)),
                    terminal,
                ])
                .boxed()
            }
            AcquireMode::Manual => {
                let (tx, rx) = oneshot::channel();
                self.pending
                    .lock()
                    .unwrap()
                    .insert(request.track_id.clone(), (request.job_id, tx));
                stream::once(async move {
                    rx.await
                        .unwrap_or_else(|_| AcquisitionUpdate::Failed("mock acquisition dropped".to_string()))
                })
                .boxed()
            }
        }
    }
}
