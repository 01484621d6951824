//! Playback coordinator
//!
//! Owns the shared timeline: the current-track slot, the queue behind it, the
//! global phase, and the single armed timer. Every transition runs while
//! holding one `tokio::sync::Mutex`, so exactly one transition is in flight
//! at any time. Acquisitions and timers run as separate tasks and re-enter
//! through the same lock, keyed by item ID.
//!
//! Phase machine:
//!
//! ```text
//! idle --request--> downloading --acquired--> prepared --start timer--> playing
//!                        |                                                  |
//!                        +--failed--> next                 end timer/cancel-+--> next
//! next: pop queue head; empty queue -> idle
//! ```

use std::sync::Arc;

use radiosync_common::events::{
    CancelResult, EventBus, NowPlayingInfo, Phase, RadioEvent, Rejection, RequestResult,
    StateSnapshot,
};
use radiosync_common::time::millis_to_duration;
use radiosync_common::TrackId;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::queue::PlaybackQueue;
use super::timers::{TimerKind, TimerSlot};
use super::types::{AcquisitionState, QueueItem};
use crate::acquisition::{run_to_completion, AcquiredMedia, AcquisitionRequest, Acquirer};
use crate::clock::EpochClock;
use crate::error::{Error, Result};
use crate::media::{media_locator, MediaRegistry};

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Maximum number of items waiting behind the current track
    pub max_queue_length: usize,
    /// Gap between a track becoming ready and its start instant
    pub start_lead_ms: i64,
    /// Prefix for media locators handed to listeners
    pub public_base_url: String,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_queue_length: 20,
            start_lead_ms: 5000,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Track occupying the current slot
#[derive(Debug)]
struct CurrentTrack {
    item: QueueItem,
    /// Set once when the track becomes prepared, never recomputed
    start_epoch_ms: Option<i64>,
    media_locator: Option<String>,
}

impl CurrentTrack {
    fn new(item: QueueItem) -> Self {
        Self {
            item,
            start_epoch_ms: None,
            media_locator: None,
        }
    }

    fn info(&self) -> NowPlayingInfo {
        let media = self.item.media();
        NowPlayingInfo {
            id: self.item.id,
            title: media.map(|m| m.title.clone()),
            track_id: self.item.track_id.clone(),
            media_locator: self.media_locator.clone(),
            duration_secs: media.map(|m| m.duration_secs),
            start_epoch_ms: self.start_epoch_ms,
        }
    }
}

#[derive(Debug, Default)]
struct CoordinatorState {
    phase: Phase,
    current: Option<CurrentTrack>,
    queue: PlaybackQueue,
    timer: TimerSlot,
    shutting_down: bool,
}

impl CoordinatorState {
    fn is_current(&self, id: Uuid) -> bool {
        self.current.as_ref().is_some_and(|c| c.item.id == id)
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase,
            queue: self.queue.to_info(),
            now_playing: self.current.as_ref().map(CurrentTrack::info),
        }
    }
}

/// Shared radio timeline
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
    events: EventBus,
    registry: Arc<MediaRegistry>,
    acquirer: Arc<dyn Acquirer>,
    clock: Arc<dyn EpochClock>,
    settings: Arc<CoordinatorSettings>,
}

impl PlaybackCoordinator {
    pub fn new(
        settings: CoordinatorSettings,
        events: EventBus,
        registry: Arc<MediaRegistry>,
        acquirer: Arc<dyn Acquirer>,
        clock: Arc<dyn EpochClock>,
    ) -> Self {
        info!(
            "Playback coordinator ready (max queue {}, start lead {} ms)",
            settings.max_queue_length, settings.start_lead_ms
        );
        Self {
            state: Arc::new(Mutex::new(CoordinatorState::default())),
            events,
            registry,
            acquirer,
            clock,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Admit a track request
    ///
    /// When idle the item becomes current at once (`position` 0); otherwise it
    /// is appended and its acquisition starts in the background right away.
    pub async fn add_to_queue(&self, track_id: TrackId) -> Result<RequestResult> {
        let mut state = self.state.lock().await;
        if state.shutting_down {
            return Err(Error::InvalidState("Server is shutting down".to_string()));
        }

        if state.queue.len() >= self.settings.max_queue_length {
            info!("Rejecting {}: queue is full ({})", track_id, state.queue.len());
            return Ok(RequestResult::rejected(Rejection::QueueFull));
        }

        let duplicate = state
            .current
            .as_ref()
            .is_some_and(|c| c.item.track_id == track_id)
            || state.queue.contains_track(&track_id);
        if duplicate {
            info!("Rejecting {}: already current or queued", track_id);
            return Ok(RequestResult::rejected(Rejection::Duplicate));
        }

        let mut item = QueueItem::new(track_id.clone(), self.clock.now_epoch_ms());
        let id = item.id;

        if state.phase == Phase::Idle {
            info!("Starting immediate acquisition: {} ({})", track_id, id);
            state.current = Some(CurrentTrack::new(item));
            self.begin_download(&mut state);
            return Ok(RequestResult::accepted(0, id));
        }

        item.in_flight = true;
        state.queue.push_back(item);
        let position = state.queue.len();
        info!("Queued {} ({}) at position {}, starting background acquisition", track_id, id, position);

        self.broadcast_queue(&state);
        self.events.emit_lossy(RadioEvent::Downloading {
            id,
            track_id: track_id.clone(),
        });
        self.spawn_acquisition(id, track_id);

        Ok(RequestResult::accepted(position, id))
    }

    /// Remove a track from the current slot or the queue
    ///
    /// Returns `Error::NotFound` without touching any state when `id` is
    /// neither current nor queued.
    pub async fn cancel_song(&self, id: Uuid) -> Result<CancelResult> {
        let mut state = self.state.lock().await;

        if state.is_current(id) {
            state.timer.disarm();
            if let Err(e) = self.registry.delete(id).await {
                warn!("Failed to delete media for canceled song {}: {}", id, e);
            }

            let title = state
                .current
                .take()
                .and_then(|c| c.item.title().map(str::to_string))
                .unwrap_or_else(|| "Unknown".to_string());
            info!("Canceled current song {} ({})", id, title);
            self.events.emit_lossy(RadioEvent::SongCanceled { id, title });

            self.process_next_in_queue(&mut state);
            return Ok(CancelResult::ok("Currently playing song canceled"));
        }

        if let Some(item) = state.queue.remove(id) {
            if item.is_resolved() {
                if let Err(e) = self.registry.delete(id).await {
                    warn!("Failed to delete media for canceled queue item {}: {}", id, e);
                }
            }
            let title = item.title().unwrap_or("Unknown").to_string();
            info!("Removed {} ({}) from queue", id, title);

            self.broadcast_queue(&state);
            self.events.emit_lossy(RadioEvent::SongCanceled { id, title });
            return Ok(CancelResult::ok("Song removed from queue"));
        }

        Err(Error::NotFound(format!("Song {} not found in current track or queue", id)))
    }

    /// Point-in-time view for newly connected observers
    pub async fn get_current_state(&self) -> StateSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Stop all timers, refuse further transitions and delete the current
    /// track's media
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.shutting_down {
            return;
        }
        info!("Shutting down playback coordinator");
        state.shutting_down = true;
        state.timer.disarm();

        if let Some(id) = state.current.as_ref().map(|c| c.item.id) {
            if let Err(e) = self.registry.delete(id).await {
                warn!("Error during shutdown cleanup of {}: {}", id, e);
            }
        }
    }

    // ========================================
    // Transitions (caller holds the lock)
    // ========================================

    /// Pop queue items until one becomes current, or go idle
    ///
    /// Items whose background acquisition failed are skipped with an error
    /// broadcast; resolved items go straight to prepared.
    fn process_next_in_queue(&self, state: &mut CoordinatorState) {
        loop {
            let Some(item) = state.queue.pop_front() else {
                state.current = None;
                state.phase = Phase::Idle;
                state.timer.disarm();
                info!("Queue empty, returning to idle");
                self.broadcast_queue(state);
                return;
            };
            self.broadcast_queue(state);

            if let AcquisitionState::Failed(reason) = &item.state {
                info!("Skipping failed item {} ({})", item.id, item.track_id);
                self.events.emit_lossy(RadioEvent::Error {
                    message: format!("Skipping failed song: {}", reason),
                    id: Some(item.id),
                });
                continue;
            }

            let resolved = item.is_resolved();
            state.current = Some(CurrentTrack::new(item));
            if resolved {
                self.prepare_current(state);
            } else {
                self.begin_download(state);
            }
            return;
        }
    }

    /// Current slot enters downloading; adopt an in-flight acquisition if
    /// one exists
    fn begin_download(&self, state: &mut CoordinatorState) {
        let Some(current) = state.current.as_mut() else {
            return;
        };
        let id = current.item.id;
        let track_id = current.item.track_id.clone();
        let adopt = current.item.in_flight;
        current.item.in_flight = true;
        state.phase = Phase::Downloading;

        self.events.emit_lossy(RadioEvent::Downloading {
            id,
            track_id: track_id.clone(),
        });

        if adopt {
            debug!("Adopting in-flight acquisition for {}", id);
        } else {
            self.spawn_acquisition(id, track_id);
        }
    }

    /// Current slot holds resolved media: fix the start instant, register the
    /// file, announce, and arm the start timer
    fn prepare_current(&self, state: &mut CoordinatorState) {
        let now = self.clock.now_epoch_ms();
        let Some(current) = state.current.as_mut() else {
            return;
        };
        let id = current.item.id;
        let Some(media) = current.item.media().cloned() else {
            warn!("Cannot prepare {} without media", id);
            return;
        };

        let start_epoch_ms = *current
            .start_epoch_ms
            .get_or_insert(now + self.settings.start_lead_ms);
        let locator = media_locator(&self.settings.public_base_url, id);
        current.media_locator = Some(locator.clone());
        let track_id = current.item.track_id.clone();

        self.registry.register(id, media.path.clone());
        state.phase = Phase::Prepared;

        info!(
            "Prepared {} ({}), start at {} ({} ms from now)",
            id,
            media.title,
            start_epoch_ms,
            start_epoch_ms - now
        );
        self.events.emit_lossy(RadioEvent::Prepare {
            id,
            title: media.title,
            track_id,
            media_locator: locator,
            duration_secs: media.duration_secs,
            start_epoch_ms,
        });

        self.arm_timer(state, TimerKind::Start, id, start_epoch_ms - now);
    }

    fn arm_timer(&self, state: &mut CoordinatorState, kind: TimerKind, id: Uuid, delay_ms: i64) {
        let generation = state.timer.next_generation();
        let delay = millis_to_duration(delay_ms);
        debug!("Arming {:?} timer for {} in {:?} (generation {})", kind, id, delay, generation);

        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.on_timer(kind, id, generation).await;
        });
        state.timer.arm(kind, id, generation, handle);
    }

    fn spawn_acquisition(&self, id: Uuid, track_id: TrackId) {
        let stream = self.acquirer.acquire(AcquisitionRequest {
            job_id: id,
            track_id: track_id.clone(),
        });

        let coordinator = self.clone();
        tokio::spawn(async move {
            let events = coordinator.events.clone();
            let result = run_to_completion(stream, |progress| {
                events.emit_lossy(RadioEvent::DownloadProgress {
                    id,
                    track_id: track_id.clone(),
                    progress,
                });
            })
            .await;
            coordinator.on_acquisition_finished(id, result).await;
        });
    }

    fn broadcast_queue(&self, state: &CoordinatorState) {
        let queue = state.queue.to_info();
        debug!("Broadcasting queue ({} items)", queue.len());
        self.events.emit_lossy(RadioEvent::QueueUpdated { queue });
    }

    // ========================================
    // Re-entry from tasks
    // ========================================

    async fn on_timer(&self, kind: TimerKind, id: Uuid, generation: u64) {
        let mut state = self.state.lock().await;
        if state.shutting_down || !state.timer.release(generation) {
            debug!("Ignoring stale {:?} timer for {}", kind, id);
            return;
        }
        let Some(current) = state.current.as_ref().filter(|c| c.item.id == id) else {
            return;
        };

        match (kind, state.phase) {
            (TimerKind::Start, Phase::Prepared) => {
                let Some(start_epoch_ms) = current.start_epoch_ms else {
                    return;
                };
                let duration_ms = current
                    .item
                    .media()
                    .map(|m| (m.duration_secs * 1000.0).round() as i64)
                    .unwrap_or(0);

                state.phase = Phase::Playing;
                info!("Playback started: {} at {}", id, start_epoch_ms);
                self.events.emit_lossy(RadioEvent::Start { id, start_epoch_ms });

                let end_at = start_epoch_ms + duration_ms;
                let now = self.clock.now_epoch_ms();
                self.arm_timer(&mut state, TimerKind::End, id, end_at - now);
            }
            (TimerKind::End, Phase::Playing) => {
                info!("Playback ended: {}", id);
                self.events.emit_lossy(RadioEvent::Ended { id });
                if let Err(e) = self.registry.delete(id).await {
                    warn!("Failed to delete media for {}: {}", id, e);
                }
                state.current = None;
                self.process_next_in_queue(&mut state);
            }
            (kind, phase) => {
                warn!("{:?} timer fired for {} in phase {}", kind, id, phase);
            }
        }
    }

    async fn on_acquisition_finished(
        &self,
        id: Uuid,
        result: std::result::Result<AcquiredMedia, String>,
    ) {
        let mut state = self.state.lock().await;

        if state.shutting_down {
            drop(state);
            self.discard(result).await;
            return;
        }

        if state.is_current(id) {
            if let Some(current) = state.current.as_mut() {
                current.item.in_flight = false;
            }
            if state.phase != Phase::Downloading {
                warn!("Acquisition finished for {} in phase {}", id, state.phase);
                return;
            }

            match result {
                Ok(media) => {
                    if let Some(current) = state.current.as_mut() {
                        current.item.state = AcquisitionState::Resolved(media);
                    }
                    self.prepare_current(&mut state);
                }
                Err(reason) => {
                    warn!("Download failed for {}: {}", id, reason);
                    self.events.emit_lossy(RadioEvent::Error {
                        message: format!("Download failed: {}", reason),
                        id: Some(id),
                    });
                    state.current = None;
                    self.process_next_in_queue(&mut state);
                }
            }
            return;
        }

        if let Some(item) = state.queue.get_mut(id) {
            item.in_flight = false;
            let track_id = item.track_id.clone();
            match result {
                Ok(media) => {
                    info!("Background acquisition completed: {} ({})", track_id, media.title);
                    let title = media.title.clone();
                    self.registry.register(id, media.path.clone());
                    item.state = AcquisitionState::Resolved(media);
                    self.events.emit_lossy(RadioEvent::QueueItemDownloaded { id, track_id, title });
                }
                Err(reason) => {
                    warn!("Background download failed for {}: {}", track_id, reason);
                    item.state = AcquisitionState::Failed(reason.clone());
                    self.events.emit_lossy(RadioEvent::Error {
                        message: format!("Background download failed: {}", reason),
                        id: Some(id),
                    });
                }
            }
            self.broadcast_queue(&state);
            return;
        }

        // Item was canceled while its acquisition was in flight
        drop(state);
        debug!("Discarding acquisition result for canceled item {}", id);
        self.discard(result).await;
    }

    async fn discard(&self, result: std::result::Result<AcquiredMedia, String>) {
        if let Ok(media) = result {
            if let Err(e) = self.registry.discard_file(&media.path).await {
                warn!("Failed to discard {}: {}", media.path.display(), e);
            }
        }
    }
}
