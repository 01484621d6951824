//! HTTP request handlers
//!
//! Implements the REST endpoints for requesting and canceling tracks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use radiosync_common::events::{CancelResult, RequestResult, StateSnapshot};
use radiosync_common::TrackId;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppContext;
use crate::error::Error;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    /// Server epoch milliseconds
    timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    track_id: String,
}

/// Map an error to a status code and a body safe to show the requester
pub fn error_response(e: &Error) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        Error::NotFound(msg) => (StatusCode::NOT_FOUND, Json(ErrorResponse::new(msg.clone()))),
        Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(msg.clone()))),
        Error::Common(radiosync_common::Error::InvalidInput(msg)) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(msg.clone())))
        }
        Error::InvalidState(msg) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(msg.clone())),
        ),
        other => {
            error!("Internal error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error")),
            )
        }
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "radiosync_server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: ctx.clock.now_epoch_ms(),
    })
}

// ============================================================================
// Timeline Endpoints
// ============================================================================

/// POST /request - Ask for a track to be played
///
/// Rejections (queue full, duplicate) are `200` with `accepted: false`.
pub async fn request_track(
    State(ctx): State<AppContext>,
    Json(req): Json<TrackRequest>,
) -> Result<Json<RequestResult>, (StatusCode, Json<ErrorResponse>)> {
    let track_id = TrackId::parse(&req.track_id).map_err(|e| {
        warn!("Rejected malformed track ID {:?}", req.track_id);
        error_response(&Error::Common(e))
    })?;

    info!("Track request: {}", track_id);
    match ctx.coordinator.add_to_queue(track_id).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => Err(error_response(&e)),
    }
}

/// GET /current - Current phase, queue and now-playing track
pub async fn get_current(State(ctx): State<AppContext>) -> Json<StateSnapshot> {
    Json(ctx.coordinator.get_current_state().await)
}

/// POST /cancel/:id and DELETE /queue/:id - Cancel a current or queued track
///
/// Every failure carries a `CancelResult` body with `success: false`.
pub async fn cancel_song(
    State(ctx): State<AppContext>,
    Path(raw_id): Path<String>,
) -> Result<Json<CancelResult>, (StatusCode, Json<CancelResult>)> {
    info!("Cancel request: {}", raw_id);

    let result = match raw_id.parse::<Uuid>() {
        Ok(id) => ctx.coordinator.cancel_song(id).await,
        Err(_) => Err(Error::BadRequest(format!("Invalid song ID: {}", raw_id))),
    };

    match result {
        Ok(result) => Ok(Json(result)),
        Err(Error::NotFound(msg)) => {
            info!("Cancel of unknown song {}", raw_id);
            Err((StatusCode::NOT_FOUND, Json(CancelResult::failed(msg))))
        }
        Err(Error::BadRequest(msg)) => {
            warn!("Rejected cancel: {}", msg);
            Err((StatusCode::BAD_REQUEST, Json(CancelResult::failed(msg))))
        }
        Err(e) => {
            let (status, _) = error_response(&e);
            Err((status, Json(CancelResult::failed("Failed to cancel song"))))
        }
    }
}
