//! HTTP API for radiosync-server
//!
//! Request/cancel endpoints, the state snapshot, media serving and the SSE
//! event stream.

pub mod handlers;
pub mod media;
pub mod sse;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use radiosync_common::events::EventBus;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::clock::EpochClock;
use crate::media::MediaRegistry;
use crate::playback::PlaybackCoordinator;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub coordinator: PlaybackCoordinator,
    pub registry: Arc<MediaRegistry>,
    pub events: EventBus,
    pub clock: Arc<dyn EpochClock>,
    /// Cancelled at shutdown; ends every open event stream
    pub shutdown: CancellationToken,
}

/// Build the application router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Timeline control
        .route("/request", post(handlers::request_track))
        .route("/current", get(handlers::get_current))
        .route("/cancel/:id", post(handlers::cancel_song))
        .route("/queue/:id", delete(handlers::cancel_song))
        // Media for listeners
        .route("/audio/:id", get(media::serve_audio))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Listeners load media cross-origin
        .layer(CorsLayer::permissive())
}
