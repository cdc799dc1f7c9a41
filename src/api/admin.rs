//! Admin API endpoints
//!
//! Mirror and backup triggers. All routes require the admin token.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;

use crate::AppState;
use crate::auth::AdminUser;
use crate::data::StoredObject;
use crate::error::AppError;
use crate::mirror::MirroredObject;
use crate::service::{GalleryBackup, PendingBackup, SyncReport};

const DEFAULT_OBJECT_LIMIT: i64 = 100;
const MAX_OBJECT_LIMIT: i64 = 1000;

/// Create admin router
///
/// Routes:
/// - POST /admin/mirror - Mirror one image
/// - POST /admin/projects/:id/backup - Mirror a project cover
/// - POST /admin/posts/:id/backup - Mirror a post cover
/// - POST /admin/projects/:id/gallery/backup - Mirror a project gallery
/// - POST /admin/projects/:id/gallery/:index/backup - Mirror one gallery image
/// - POST /admin/backup-pending - Mirror every cover still missing a backup
/// - POST /admin/sync/behance - Run the Behance sync
/// - GET /admin/objects - List the stored object manifest
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/mirror", post(mirror_image))
        .route("/projects/:id/backup", post(backup_project))
        .route("/posts/:id/backup", post(backup_post))
        .route("/projects/:id/gallery/backup", post(backup_gallery))
        .route(
            "/projects/:id/gallery/:index/backup",
            post(backup_gallery_image),
        )
        .route("/backup-pending", post(backup_pending))
        .route("/sync/behance", post(sync_behance))
        .route("/objects", get(list_objects))
}

// =============================================================================
// Mirror
// =============================================================================

#[derive(Debug, Deserialize)]
struct MirrorRequest {
    url: String,
    entity_id: Option<String>,
}

/// POST /admin/mirror
async fn mirror_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<MirrorRequest>,
) -> Result<Json<MirroredObject>, AppError> {
    let object = state
        .content
        .mirror_single(&req.url, req.entity_id.as_deref())
        .await?;
    Ok(Json(object))
}

/// POST /admin/projects/:id/backup
async fn backup_project(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MirroredObject>, AppError> {
    Ok(Json(state.content.backup_project_cover(&id).await?))
}

/// POST /admin/posts/:id/backup
async fn backup_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MirroredObject>, AppError> {
    Ok(Json(state.content.backup_post_cover(&id).await?))
}

/// POST /admin/projects/:id/gallery/backup
async fn backup_gallery(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<GalleryBackup>, AppError> {
    Ok(Json(state.content.backup_gallery(&id).await?))
}

/// POST /admin/projects/:id/gallery/:index/backup
async fn backup_gallery_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<MirroredObject>, AppError> {
    Ok(Json(state.content.backup_gallery_image(&id, index).await?))
}

/// POST /admin/backup-pending
async fn backup_pending(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<PendingBackup>, AppError> {
    Ok(Json(state.content.backup_pending().await?))
}

// =============================================================================
// Behance
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct SyncRequest {
    username: Option<String>,
}

/// POST /admin/sync/behance
///
/// The body is optional; the configured username is used by default.
async fn sync_behance(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncReport>, AppError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let username = request
        .username
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.config.integrations.behance_username.clone());

    Ok(Json(state.behance.sync(&username).await?))
}

// =============================================================================
// Manifest
// =============================================================================

#[derive(Debug, Deserialize)]
struct ObjectsQuery {
    entity_id: Option<String>,
    limit: Option<i64>,
}

/// GET /admin/objects?entity_id=...&limit=...
async fn list_objects(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ObjectsQuery>,
) -> Result<Json<Vec<StoredObject>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_OBJECT_LIMIT)
        .clamp(1, MAX_OBJECT_LIMIT);
    let entity_id = query.entity_id.as_deref().filter(|id| !id.is_empty());

    let objects = state.db.list_stored_objects(entity_id, limit).await?;
    Ok(Json(objects))
}
