//! Image proxy endpoint
//!
//! Primary fetch route of the mirror pipeline, and usable by browsers to
//! load hotlink-protected images.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::mirror::content_type::effective_content_type;

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// Create image proxy router
///
/// Routes:
/// - GET /proxy-image
pub fn proxy_router() -> Router<AppState> {
    Router::new().route("/proxy-image", get(proxy_image))
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

/// GET /api/proxy-image?url=...
///
/// Streams the upstream bytes back with its content type and permissive
/// CORS so the result can be drawn on a canvas.
async fn proxy_image(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, AppError> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing url parameter".to_string()))?;

    let image = state.relay.fetch_image(&url).await.map_err(|error| {
        tracing::warn!(%url, %error, "Image proxy fetch failed");
        error
    })?;

    let content_type = effective_content_type(image.content_type.as_deref()).to_string();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE.to_string()),
        ],
        image.bytes,
    )
        .into_response())
}
