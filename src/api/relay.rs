//! Third-party relay endpoints
//!
//! - /behance-rss
//! - /vimeo-info
//! - /bing-push
//! - /baidu-push
//! - /notify-lead

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;

const NO_STORE: &str = "no-store, no-cache, must-revalidate";
const OEMBED_CACHE: &str = "public, s-maxage=86400, stale-while-revalidate=3600";

/// Create relay router
///
/// Routes:
/// - GET /behance-rss
/// - GET /vimeo-info
/// - GET /bing-push
/// - GET /baidu-push
/// - POST /notify-lead
pub fn relay_router() -> Router<AppState> {
    Router::new()
        .route("/behance-rss", get(behance_rss))
        .route("/vimeo-info", get(vimeo_info))
        .route("/bing-push", get(bing_push))
        .route("/baidu-push", get(baidu_push))
        .route("/notify-lead", post(notify_lead))
}

#[derive(Debug, Deserialize)]
struct BehanceQuery {
    username: Option<String>,
}

/// GET /api/behance-rss?username=...
///
/// Falls back to the configured username.
async fn behance_rss(
    State(state): State<AppState>,
    Query(query): Query<BehanceQuery>,
) -> Result<Response, AppError> {
    let username = query
        .username
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.config.integrations.behance_username.clone());

    let xml = state.relay.behance_feed(&username).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, NO_STORE),
        ],
        xml,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct VimeoQuery {
    url: Option<String>,
    id: Option<String>,
}

impl VimeoQuery {
    fn video_url(self) -> Option<String> {
        if let Some(url) = self.url.filter(|url| !url.trim().is_empty()) {
            return Some(url);
        }
        self.id
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(|id| format!("https://vimeo.com/{}", id))
    }
}

/// GET /api/vimeo-info?url=... or ?id=...
async fn vimeo_info(
    State(state): State<AppState>,
    Query(query): Query<VimeoQuery>,
) -> Result<Response, AppError> {
    let video_url = query
        .video_url()
        .ok_or_else(|| AppError::Validation("Missing url or numeric id parameter".to_string()))?;

    let info = state.relay.vimeo_oembed(&video_url).await?;

    Ok((
        StatusCode::OK,
        [(header::CACHE_CONTROL, OEMBED_CACHE)],
        Json(info),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

/// GET /api/bing-push
async fn bing_push(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.relay.ping_bing().await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
struct BaiduQuery {
    site: Option<String>,
    token: Option<String>,
    url: Option<String>,
}

/// GET /api/baidu-push?site=...&token=...&url=...
async fn baidu_push(
    State(state): State<AppState>,
    Query(query): Query<BaiduQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (Some(site), Some(token), Some(url)) = (query.site, query.token, query.url) else {
        return Err(AppError::Validation(
            "Missing site, token or url parameter".to_string(),
        ));
    };

    let response = state.relay.push_baidu(&site, &token, &url).await?;
    Ok(Json(response.0))
}

#[derive(Debug, Deserialize)]
struct LeadRequest {
    contact: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct LeadResponse {
    success: bool,
    /// Whether a notification actually went out
    notified: bool,
}

/// POST /api/notify-lead
async fn notify_lead(
    State(state): State<AppState>,
    Json(request): Json<LeadRequest>,
) -> Result<Json<LeadResponse>, AppError> {
    let contact = request
        .contact
        .filter(|contact| !contact.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing contact info".to_string()))?;

    let notified = state.relay.notify_lead(&contact, &request.message).await?;
    tracing::info!(notified, "Lead received");

    Ok(Json(LeadResponse {
        success: true,
        notified,
    }))
}
