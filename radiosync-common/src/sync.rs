//! Client synchronization logic
//!
//! Everything a listener needs to follow the shared timeline:
//! - `ClockSync`: offset between the local clock and the server clock, taken
//!   from the last `timesync` broadcast (last sample wins, no smoothing)
//! - `schedule_start`: when to begin playback after a `prepare`
//! - `late_join_position`: where to seek when joining a track already on air
//! - `drift_correction`: whether a playing track has wandered far enough to snap
//! - `SyncClient`: a small state machine that turns broadcast events into
//!   player commands
//!
//! Nothing in here reads a clock. Callers pass the local time in epoch
//! milliseconds so the decisions are deterministic and testable.

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::events::{NowPlayingInfo, Phase, RadioEvent, StateSnapshot};
use crate::time::{millis_to_duration, millis_to_secs};

/// Tunables for client-side synchronization
#[derive(Debug, Clone, PartialEq)]
pub struct SyncParams {
    /// A start this close (or already past) plays immediately
    pub immediate_threshold_ms: i64,
    /// Local start timer fires this much early to mask load latency
    pub preroll_ms: i64,
    /// Drift beyond this triggers a hard seek
    pub drift_threshold_secs: f64,
    /// How often the host should call `SyncClient::check_drift`
    pub drift_check_interval: Duration,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self {
            immediate_threshold_ms: 200,
            preroll_ms: 50,
            drift_threshold_secs: 0.5,
            drift_check_interval: Duration::from_millis(2000),
        }
    }
}

/// Most recent `(local receive time, server time)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    pub local_receive_ms: i64,
    pub server_epoch_ms: i64,
}

impl ClockSample {
    pub fn offset_ms(&self) -> i64 {
        self.server_epoch_ms - self.local_receive_ms
    }
}

/// Local view of the server clock
#[derive(Debug, Clone, Default)]
pub struct ClockSync {
    sample: Option<ClockSample>,
}

impl ClockSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `timesync` broadcast, replacing the previous sample
    pub fn observe(&mut self, local_receive_ms: i64, server_epoch_ms: i64) {
        self.sample = Some(ClockSample {
            local_receive_ms,
            server_epoch_ms,
        });
    }

    /// `server − local` from the last sample, zero before the first one
    pub fn offset_ms(&self) -> i64 {
        self.sample.map(|s| s.offset_ms()).unwrap_or(0)
    }

    /// Local time translated to the server's clock
    pub fn corrected_now(&self, local_now_ms: i64) -> i64 {
        local_now_ms + self.offset_ms()
    }

    pub fn last_sample(&self) -> Option<ClockSample> {
        self.sample
    }
}

/// What to do after a `prepare`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartDecision {
    /// Start is due (or overdue): play now from position 0
    Immediate,
    /// Arm a local timer for this long, then play from position 0
    After(Duration),
}

/// Decide when to start a prepared track
pub fn schedule_start(start_epoch_ms: i64, corrected_now_ms: i64, params: &SyncParams) -> StartDecision {
    let delay = start_epoch_ms - corrected_now_ms;
    if delay <= params.immediate_threshold_ms {
        StartDecision::Immediate
    } else {
        StartDecision::After(millis_to_duration(delay - params.preroll_ms))
    }
}

/// Where a late joiner should begin
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LateJoin {
    /// Track is mid-flight: seek to this many seconds and play
    Seek(f64),
    /// Track has not really started from this client's view: play from 0
    FromStart,
    /// Track is already over from this client's view: do nothing
    AlreadyEnded,
}

/// Compute the seek position for a client joining a started track
pub fn late_join_position(start_epoch_ms: i64, duration_secs: f64, corrected_now_ms: i64) -> LateJoin {
    let offset = millis_to_secs(corrected_now_ms - start_epoch_ms);
    if offset <= 0.0 {
        LateJoin::FromStart
    } else if offset >= duration_secs {
        LateJoin::AlreadyEnded
    } else {
        LateJoin::Seek(offset)
    }
}

/// Position to snap to if local playback drifted past the threshold
///
/// Returns `None` when the drift is tolerable or the expected position falls
/// outside `[0, duration)`.
pub fn drift_correction(
    start_epoch_ms: i64,
    duration_secs: f64,
    corrected_now_ms: i64,
    actual_position_secs: f64,
    params: &SyncParams,
) -> Option<f64> {
    let expected = millis_to_secs(corrected_now_ms - start_epoch_ms);
    let drift = (expected - actual_position_secs).abs();

    if drift > params.drift_threshold_secs && expected >= 0.0 && expected < duration_secs {
        Some(expected)
    } else {
        None
    }
}

/// Instruction for the local media player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Load (but do not play) media from this locator
    Load { media_locator: String },
    /// Start a local timer; call `SyncClient::fire_armed_start` when it expires
    ArmStart { id: Uuid, delay: Duration },
    /// Set position and start playing
    PlayFrom { position_secs: f64 },
    /// Hard seek while playing
    Seek { position_secs: f64 },
    /// Stop and unload
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackStatus {
    /// Metadata known but media not loaded
    Known,
    /// Loaded, local start timer pending
    Armed,
    Playing,
    /// Nothing left to play locally
    Finished,
}

#[derive(Debug, Clone)]
struct ClientTrack {
    id: Uuid,
    media_locator: Option<String>,
    duration_secs: Option<f64>,
    start_epoch_ms: Option<i64>,
    status: TrackStatus,
}

impl ClientTrack {
    fn from_now_playing(info: &NowPlayingInfo) -> Self {
        Self {
            id: info.id,
            media_locator: info.media_locator.clone(),
            duration_secs: info.duration_secs,
            start_epoch_ms: info.start_epoch_ms,
            status: TrackStatus::Known,
        }
    }
}

/// Listener-side state machine
///
/// Feed it every broadcast with `handle_event`, call `fire_armed_start` when a
/// requested timer expires and `check_drift` on `drift_check_interval`.
#[derive(Debug, Clone, Default)]
pub struct SyncClient {
    clock: ClockSync,
    params: SyncParams,
    track: Option<ClientTrack>,
}

impl SyncClient {
    pub fn new(params: SyncParams) -> Self {
        Self {
            clock: ClockSync::new(),
            params,
            track: None,
        }
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    pub fn params(&self) -> &SyncParams {
        &self.params
    }

    /// ID of the track this client is following, if any
    pub fn current_track_id(&self) -> Option<Uuid> {
        self.track.as_ref().map(|t| t.id)
    }

    /// Whether local playback is running
    pub fn is_playing(&self) -> bool {
        matches!(self.track.as_ref().map(|t| t.status), Some(TrackStatus::Playing))
    }

    /// React to a broadcast event
    pub fn handle_event(&mut self, event: &RadioEvent, local_now_ms: i64) -> Vec<PlayerCommand> {
        match event {
            RadioEvent::TimeSync { server_epoch_ms } => {
                self.clock.observe(local_now_ms, *server_epoch_ms);
                Vec::new()
            }
            RadioEvent::NowPlaying { snapshot } => self.handle_snapshot(snapshot, local_now_ms),
            RadioEvent::Prepare {
                id,
                media_locator,
                duration_secs,
                start_epoch_ms,
                ..
            } => self.prepare(*id, media_locator, *duration_secs, *start_epoch_ms, local_now_ms),
            RadioEvent::Start { id, start_epoch_ms } => self.start(*id, *start_epoch_ms, local_now_ms),
            RadioEvent::Ended { id } | RadioEvent::SongCanceled { id, .. } => self.stop_if_current(*id),
            _ => Vec::new(),
        }
    }

    /// Apply the snapshot a newly connected observer receives
    pub fn handle_snapshot(&mut self, snapshot: &StateSnapshot, local_now_ms: i64) -> Vec<PlayerCommand> {
        let Some(info) = snapshot.now_playing.as_ref() else {
            return self.stop_any();
        };

        match snapshot.phase {
            Phase::Prepared => match (&info.media_locator, info.duration_secs, info.start_epoch_ms) {
                (Some(locator), Some(duration), Some(start)) => {
                    self.prepare(info.id, locator, duration, start, local_now_ms)
                }
                _ => self.remember(info),
            },
            Phase::Playing => {
                self.remember(info);
                self.late_join(local_now_ms)
            }
            Phase::Downloading | Phase::Idle => self.remember(info),
        }
    }

    /// The timer requested by `ArmStart` expired
    pub fn fire_armed_start(&mut self, id: Uuid) -> Option<PlayerCommand> {
        let track = self.track.as_mut()?;
        if track.id != id || track.status != TrackStatus::Armed {
            return None;
        }
        track.status = TrackStatus::Playing;
        Some(PlayerCommand::PlayFrom { position_secs: 0.0 })
    }

    /// Periodic drift check while playing
    pub fn check_drift(&self, local_now_ms: i64, actual_position_secs: f64) -> Option<PlayerCommand> {
        let track = self.track.as_ref()?;
        if track.status != TrackStatus::Playing {
            return None;
        }
        let start = track.start_epoch_ms?;
        let duration = track.duration_secs?;
        let now = self.clock.corrected_now(local_now_ms);

        drift_correction(start, duration, now, actual_position_secs, &self.params).map(|expected| {
            debug!(
                "Correcting drift: expected {:.2}s, actual {:.2}s",
                expected, actual_position_secs
            );
            PlayerCommand::Seek {
                position_secs: expected,
            }
        })
    }

    fn remember(&mut self, info: &NowPlayingInfo) -> Vec<PlayerCommand> {
        let mut commands = Vec::new();
        if self.track.as_ref().is_some_and(|t| t.id != info.id) {
            commands.push(PlayerCommand::Stop);
        }
        if self.track.as_ref().map(|t| t.id) != Some(info.id) {
            self.track = Some(ClientTrack::from_now_playing(info));
        }
        commands
    }

    fn prepare(
        &mut self,
        id: Uuid,
        media_locator: &str,
        duration_secs: f64,
        start_epoch_ms: i64,
        local_now_ms: i64,
    ) -> Vec<PlayerCommand> {
        // Same track and start already loaded (snapshot followed by replayed prepare)
        let already_prepared = self.track.as_ref().is_some_and(|t| {
            t.id == id && t.start_epoch_ms == Some(start_epoch_ms) && t.status != TrackStatus::Known
        });
        if already_prepared {
            return Vec::new();
        }

        let mut commands = Vec::new();
        if self.track.as_ref().is_some_and(|t| t.id != id && t.status != TrackStatus::Known) {
            commands.push(PlayerCommand::Stop);
        }
        commands.push(PlayerCommand::Load {
            media_locator: media_locator.to_string(),
        });

        let now = self.clock.corrected_now(local_now_ms);
        let status = match schedule_start(start_epoch_ms, now, &self.params) {
            StartDecision::Immediate => {
                commands.push(PlayerCommand::PlayFrom { position_secs: 0.0 });
                TrackStatus::Playing
            }
            StartDecision::After(delay) => {
                debug!("Arming local start in {:?}", delay);
                commands.push(PlayerCommand::ArmStart { id, delay });
                TrackStatus::Armed
            }
        };

        self.track = Some(ClientTrack {
            id,
            media_locator: Some(media_locator.to_string()),
            duration_secs: Some(duration_secs),
            start_epoch_ms: Some(start_epoch_ms),
            status,
        });
        commands
    }

    fn start(&mut self, id: Uuid, start_epoch_ms: i64, local_now_ms: i64) -> Vec<PlayerCommand> {
        let Some(track) = self.track.as_mut() else {
            return Vec::new();
        };
        if track.id != id {
            return Vec::new();
        }
        track.start_epoch_ms.get_or_insert(start_epoch_ms);
        let status = track.status;

        match status {
            // Prepared normally: the armed timer (or immediate start) handles it
            TrackStatus::Armed | TrackStatus::Playing | TrackStatus::Finished => Vec::new(),
            TrackStatus::Known => self.late_join(local_now_ms),
        }
    }

    fn late_join(&mut self, local_now_ms: i64) -> Vec<PlayerCommand> {
        let now = self.clock.corrected_now(local_now_ms);
        let Some(track) = self.track.as_mut() else {
            return Vec::new();
        };
        let (Some(locator), Some(duration), Some(start)) =
            (track.media_locator.clone(), track.duration_secs, track.start_epoch_ms)
        else {
            return Vec::new();
        };

        let position_secs = match late_join_position(start, duration, now) {
            LateJoin::Seek(offset) => offset,
            LateJoin::FromStart => 0.0,
            LateJoin::AlreadyEnded => {
                track.status = TrackStatus::Finished;
                return Vec::new();
            }
        };

        track.status = TrackStatus::Playing;
        vec![
            PlayerCommand::Load {
                media_locator: locator,
            },
            PlayerCommand::PlayFrom { position_secs },
        ]
    }

    fn stop_if_current(&mut self, id: Uuid) -> Vec<PlayerCommand> {
        if self.track.as_ref().map(|t| t.id) == Some(id) {
            self.stop_any()
        } else {
            Vec::new()
        }
    }

    fn stop_any(&mut self) -> Vec<PlayerCommand> {
        match self.track.take() {
            Some(_) => vec![PlayerCommand::Stop],
            None => Vec::new(),
        }
    }
}
