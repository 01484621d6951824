//! Server-Sent Events (SSE) stream
//!
//! A new observer first receives a `nowPlaying` snapshot, then the `prepare`
//! or `start` event matching the current phase so it can join mid-track, and
//! from then on every broadcast event until the server shuts down.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use radiosync_common::events::{Phase, RadioEvent, StateSnapshot};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::AppContext;

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before taking the snapshot so nothing falls in between
    let rx = ctx.events.subscribe();
    let snapshot = ctx.coordinator.get_current_state().await;
    debug!(
        "New SSE client connected (phase {}, {} subscribers)",
        snapshot.phase,
        ctx.events.subscriber_count()
    );

    let initial = stream::iter(replay_events(snapshot));
    let live = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Some(event),
            Err(e) => {
                // Lagged: this observer missed events, keep going
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    let token = ctx.shutdown.clone();
    let closed = async move { token.cancelled().await };

    let stream = initial.chain(live).take_until(closed).filter_map(|event| async move {
        match Event::default().event(event.event_name()).json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Events that bring a fresh observer up to date with `snapshot`
pub fn replay_events(snapshot: StateSnapshot) -> Vec<RadioEvent> {
    let mut events = Vec::with_capacity(2);

    if let Some(now) = &snapshot.now_playing {
        let ready = (
            now.title.clone(),
            now.media_locator.clone(),
            now.duration_secs,
            now.start_epoch_ms,
        );
        if let (Some(title), Some(media_locator), Some(duration_secs), Some(start_epoch_ms)) = ready {
            match snapshot.phase {
                Phase::Prepared => events.push(RadioEvent::Prepare {
                    id: now.id,
                    title,
                    track_id: now.track_id.clone(),
                    media_locator,
                    duration_secs,
                    start_epoch_ms,
                }),
                Phase::Playing => events.push(RadioEvent::Start {
                    id: now.id,
                    start_epoch_ms,
                }),
                Phase::Idle | Phase::Downloading => {}
            }
        }
    }

    events.insert(0, RadioEvent::NowPlaying { snapshot });
    events
}
