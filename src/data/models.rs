//! Data models
//!
//! Rust structs representing content records and the stored object
//! manifest. Generated IDs use ULID; timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Behance-synced projects keep their numeric Behance ID instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Content records
// =============================================================================

/// A portfolio project
///
/// `image_url` keeps the original (usually Behance CDN) cover;
/// `backup_image_url` holds the mirrored copy and is preferred by the site
/// when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub slug: Option<String>,
    pub title: String,
    pub category: String,
    pub image_url: String,
    pub backup_image_url: Option<String>,
    /// Behance link
    pub link: String,
    /// Gallery image URLs, in display order
    pub images: Vec<String>,
    pub sort_order: i64,
    /// `None` is treated as visible
    pub is_visible: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn needs_backup(&self) -> bool {
        needs_backup(&self.image_url, self.backup_image_url.as_deref())
    }
}

/// Row shape of `projects`; gallery images are JSON text
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProjectRow {
    pub id: String,
    pub slug: Option<String>,
    pub title: String,
    pub category: String,
    pub image_url: String,
    pub backup_image_url: Option<String>,
    pub link: String,
    pub images: String,
    pub sort_order: i64,
    pub is_visible: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        let images = serde_json::from_str::<Vec<String>>(&row.images).unwrap_or_else(|error| {
            tracing::warn!(project_id = %row.id, %error, "Ignoring malformed gallery JSON");
            Vec::new()
        });

        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            category: row.category,
            image_url: row.image_url,
            backup_image_url: row.backup_image_url,
            link: row.link,
            images,
            sort_order: row.sort_order,
            is_visible: row.is_visible,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title_en: String,
    pub title_zh: String,
    pub image_url: String,
    pub backup_image_url: Option<String>,
    /// Publication date as shown on the site (YYYY-MM-DD)
    pub date: String,
    pub sort_order: i64,
    pub is_visible: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn needs_backup(&self) -> bool {
        needs_backup(&self.image_url, self.backup_image_url.as_deref())
    }

    /// `post_<slug>`, or `post_untitled` without a slug
    pub fn backup_entity_prefix(&self) -> String {
        let slug = if self.slug.trim().is_empty() {
            "untitled"
        } else {
            self.slug.as_str()
        };
        format!("post_{}", slug)
    }

    /// Entity ID used when naming this post's mirrored cover
    ///
    /// `millis` should be read right before the upload.
    pub fn backup_entity_id(&self, millis: i64) -> String {
        post_entity_id(&self.backup_entity_prefix(), millis)
    }
}

/// Append the upload time to a post's entity prefix
pub fn post_entity_id(prefix: &str, millis: i64) -> String {
    format!("{}_{}", prefix, millis)
}

fn needs_backup(image_url: &str, backup_image_url: Option<&str>) -> bool {
    !image_url.trim().is_empty() && backup_image_url.map(str::trim).unwrap_or("").is_empty()
}

/// Content record a bulk item belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContentRef {
    Project(String),
    Post(String),
}

// =============================================================================
// Stored object manifest
// =============================================================================

/// One object uploaded to the bucket
///
/// Rows are only ever inserted. Nothing here deletes objects; the manifest
/// exists so that stale objects can be found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredObject {
    pub key: String,
    pub entity_id: String,
    pub source_url: String,
    pub public_url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&crate::mirror::MirroredObject> for StoredObject {
    fn from(object: &crate::mirror::MirroredObject) -> Self {
        Self {
            key: object.key.clone(),
            entity_id: object.entity_id.clone(),
            source_url: object.source_url.clone(),
            public_url: object.public_url.clone(),
            content_type: object.content_type.clone(),
            size_bytes: object.size_bytes as i64,
            created_at: object.created_at,
        }
    }
}
