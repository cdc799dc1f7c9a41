//! Content backup service
//!
//! Caller sites of the mirror pipeline: single images, project and post
//! covers, project galleries and the sweep over everything not yet
//! mirrored. Every successful upload is written to the manifest.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::data::{ContentRef, Database, EntityId, StoredObject, post_entity_id};
use crate::error::AppError;
use crate::mirror::{
    BulkItem, BulkProgress, BulkSink, BulkSummary, MirrorService, MirroredObject, mirror_all,
    mirror_all_into,
};

/// Result of mirroring a project gallery
#[derive(Debug, Clone, Serialize)]
pub struct GalleryBackup {
    /// Gallery after replacement, same order as before
    pub images: Vec<String>,
    pub summary: BulkSummary,
    pub failures: Vec<(usize, String)>,
}

/// Result of the sweep over unmirrored covers
#[derive(Debug, Clone, Default, Serialize)]
pub struct PendingBackup {
    pub projects: Option<BulkSummary>,
    pub posts: Option<BulkSummary>,
    pub failures: Vec<(ContentRef, String)>,
}

impl PendingBackup {
    pub fn succeeded(&self) -> usize {
        self.projects.map(|s| s.succeeded).unwrap_or(0)
            + self.posts.map(|s| s.succeeded).unwrap_or(0)
    }
}

/// Content backup service
pub struct ContentBackupService {
    db: Arc<Database>,
    mirror: Arc<MirrorService>,
}

impl ContentBackupService {
    pub fn new(db: Arc<Database>, mirror: Arc<MirrorService>) -> Self {
        Self { db, mirror }
    }

    /// Mirror one image for an entity
    ///
    /// A fresh ULID names the object when no entity is given.
    pub async fn mirror_single(
        &self,
        source_url: &str,
        entity_id: Option<&str>,
    ) -> Result<MirroredObject, AppError> {
        let entity_id = entity_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| EntityId::new().0);

        let object = self.mirror.mirror_image(source_url, &entity_id).await?;
        self.record(&object).await;
        Ok(object)
    }

    /// Mirror a project's cover and store it as `backup_image_url`
    pub async fn backup_project_cover(&self, project_id: &str) -> Result<MirroredObject, AppError> {
        let project = self
            .db
            .get_project(project_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if project.image_url.trim().is_empty() {
            return Err(AppError::Validation(
                "project has no image_url to back up".to_string(),
            ));
        }

        let object = self
            .mirror
            .mirror_image(&project.image_url, &project.id)
            .await?;
        self.record(&object).await;
        self.db
            .set_project_backup_url(&project.id, &object.public_url)
            .await?;

        Ok(object)
    }

    /// Mirror a post's cover and store it as `backup_image_url`
    pub async fn backup_post_cover(&self, post_id: &str) -> Result<MirroredObject, AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;

        if post.image_url.trim().is_empty() {
            return Err(AppError::Validation(
                "post has no image_url to back up".to_string(),
            ));
        }

        let entity_id = post.backup_entity_id(Utc::now().timestamp_millis());
        let object = self.mirror.mirror_image(&post.image_url, &entity_id).await?;
        self.record(&object).await;
        self.db
            .set_post_backup_url(&post.id, &object.public_url)
            .await?;

        Ok(object)
    }

    /// Mirror every external image of a project gallery
    ///
    /// Mirrored URLs replace the originals at the same position. Already
    /// mirrored images and video embeds are left untouched.
    pub async fn backup_gallery(&self, project_id: &str) -> Result<GalleryBackup, AppError> {
        let project = self
            .db
            .get_project(project_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let items = project
            .images
            .iter()
            .enumerate()
            .map(|(index, url)| BulkItem {
                key: index,
                entity_id: project.id.clone(),
                source_url: url.clone(),
            })
            .collect();

        let report = mirror_all(&self.mirror, items, |progress| {
            log_progress("gallery", progress)
        })
        .await;

        let mut images = project.images.clone();
        for (index, object) in &report.successes {
            self.record(object).await;
            images[*index] = object.public_url.clone();
        }

        if !report.successes.is_empty() {
            self.db.set_project_images(&project.id, &images).await?;
        }

        Ok(GalleryBackup {
            images,
            summary: report.summary(),
            failures: report.failures,
        })
    }

    /// Mirror the gallery image at `index` and replace it in place
    ///
    /// The image is mirrored whatever its current host; other positions
    /// are not touched.
    pub async fn backup_gallery_image(
        &self,
        project_id: &str,
        index: usize,
    ) -> Result<MirroredObject, AppError> {
        let project = self
            .db
            .get_project(project_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let source_url = project.images.get(index).ok_or_else(|| {
            AppError::Validation(format!(
                "gallery has {} images, no index {}",
                project.images.len(),
                index
            ))
        })?;

        let object = self.mirror.mirror_image(source_url, &project.id).await?;
        self.record(&object).await;

        let mut images = project.images.clone();
        images[index] = object.public_url.clone();
        self.db.set_project_images(&project.id, &images).await?;

        Ok(object)
    }

    /// Mirror every project cover, then every post cover, still missing a
    /// backup
    ///
    /// Each cover is saved as soon as it is uploaded. A record that cannot
    /// be updated, for instance because it was deleted mid-run, becomes a
    /// failure entry and the sweep goes on.
    pub async fn backup_pending(&self) -> Result<PendingBackup, AppError> {
        let mut result = PendingBackup::default();

        let projects = self.db.projects_pending_backup().await?;
        if !projects.is_empty() {
            tracing::info!(count = projects.len(), "Backing up remaining projects");

            let items = projects
                .into_iter()
                .map(|project| BulkItem {
                    key: ContentRef::Project(project.id.clone()),
                    entity_id: project.id,
                    source_url: project.image_url,
                })
                .collect();

            let report = mirror_all_into(&self.mirror, items, self, |progress| {
                log_progress("projects", progress)
            })
            .await;
            result.projects = Some(report.summary());
            result.failures.extend(report.failures);
        }

        let posts = self.db.posts_pending_backup().await?;
        if !posts.is_empty() {
            tracing::info!(count = posts.len(), "Backing up posts");

            let items = posts
                .into_iter()
                .map(|post| BulkItem {
                    entity_id: post.backup_entity_prefix(),
                    key: ContentRef::Post(post.id),
                    source_url: post.image_url,
                })
                .collect();

            let report = mirror_all_into(&self.mirror, items, self, |progress| {
                log_progress("posts", progress)
            })
            .await;
            result.posts = Some(report.summary());
            result.failures.extend(report.failures);
        }

        Ok(result)
    }

    /// Manifest writes never fail the backup: the object is already public
    async fn record(&self, object: &MirroredObject) {
        if let Err(error) = self.db.record_stored_object(&StoredObject::from(object)).await {
            tracing::warn!(key = %object.key, %error, "Failed to record stored object");
        }
    }
}

#[async_trait]
impl BulkSink<ContentRef> for ContentBackupService {
    async fn apply(&self, content: &ContentRef, object: &MirroredObject) -> Result<(), AppError> {
        self.record(object).await;
        match content {
            ContentRef::Project(id) => self.db.set_project_backup_url(id, &object.public_url).await,
            ContentRef::Post(id) => self.db.set_post_backup_url(id, &object.public_url).await,
        }
    }

    fn entity_id(&self, content: &ContentRef, base: &str) -> String {
        match content {
            ContentRef::Project(_) => base.to_string(),
            ContentRef::Post(_) => post_entity_id(base, Utc::now().timestamp_millis()),
        }
    }
}

fn log_progress(run: &str, progress: BulkProgress) {
    tracing::debug!(
        run,
        current = progress.current,
        total = progress.total,
        "Backing up {}/{}",
        progress.current,
        progress.total
    );
}
