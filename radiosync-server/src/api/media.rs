//! Media serving
//!
//! Streams registered files to listeners with byte-range support. Responses
//! carry `Cache-Control: no-store`; the file behind an ID is deleted once
//! the track is over. A file that cannot be checked is a 500.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;
use uuid::Uuid;

use super::handlers::{error_response, ErrorResponse};
use super::AppContext;
use crate::error::Error;

/// GET /audio/:id - Serve a registered media file
pub async fn serve_audio(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    let path = id
        .parse::<Uuid>()
        .ok()
        .and_then(|id| ctx.registry.lookup(id));

    let Some(path) = path else {
        debug!("Audio request for unknown id {}", id);
        return not_found();
    };

    match tokio::fs::try_exists(&path).await {
        Ok(true) => {}
        Ok(false) => {
            debug!("Audio file for {} is gone: {}", id, path.display());
            return not_found();
        }
        Err(e) => {
            let err = Error::Internal(format!("Cannot access {}: {}", path.display(), e));
            return error_response(&err).into_response();
        }
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Audio file not found")),
    )
        .into_response()
}
