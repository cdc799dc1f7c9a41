//! Behance portfolio sync
//!
//! Pulls the user's Behance RSS feed, creates projects for new gallery
//! entries, mirrors covers for known ones still pointing at Behance, then
//! sweeps every remaining unmirrored cover.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::data::{Database, Project};
use crate::error::AppError;

use super::content::{ContentBackupService, PendingBackup};
use super::feed::{FeedEntry, parse_feed};
use super::relay::RelayClient;

const DEFAULT_CATEGORY: &str = "Branding";

/// Outcome of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Items in the feed
    pub feed_items: usize,
    /// New projects inserted
    pub created: usize,
    /// Existing projects whose cover was mirrored during the feed pass
    pub refreshed: usize,
    /// Covers that could not be mirrored during the feed pass
    pub failed: Vec<String>,
    /// Final sweep over everything still missing a backup
    pub pending: PendingBackup,
}

/// Behance sync
pub struct BehanceSync {
    db: Arc<Database>,
    content: Arc<ContentBackupService>,
    relay: Arc<RelayClient>,
}

impl BehanceSync {
    pub fn new(
        db: Arc<Database>,
        content: Arc<ContentBackupService>,
        relay: Arc<RelayClient>,
    ) -> Self {
        Self { db, content, relay }
    }

    /// Run one sync for `username`
    ///
    /// An empty feed is an error: Behance serves empty feeds for unknown
    /// users and while rate limiting.
    pub async fn sync(&self, username: &str) -> Result<SyncReport, AppError> {
        let xml = self.relay.behance_feed(username).await?;
        let entries = parse_feed(&xml);
        if entries.is_empty() {
            return Err(AppError::Upstream(format!(
                "Behance feed for '{}' has no items",
                username
            )));
        }

        tracing::info!(username, items = entries.len(), "Syncing Behance feed");

        let mut report = SyncReport {
            feed_items: entries.len(),
            created: 0,
            refreshed: 0,
            failed: Vec::new(),
            pending: PendingBackup::default(),
        };

        let max_sort_order = self.db.max_project_sort_order().await?;
        let mut count: i64 = 0;

        for entry in &entries {
            let Some(id) = entry.gallery_id() else {
                tracing::debug!(link = %entry.link, "Skipping feed item without gallery ID");
                continue;
            };
            let Some(cover) = entry.cover_url() else {
                tracing::debug!(id, "Skipping feed item without cover image");
                continue;
            };

            match self
                .apply_entry(entry, id, cover, max_sort_order + count + 1, &mut report)
                .await
            {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(id, %error, "Failed to save Behance project; continuing");
                    if !report.failed.iter().any(|failed| failed == id) {
                        report.failed.push(id.to_string());
                    }
                }
            }
        }

        report.pending = self.content.backup_pending().await?;

        if report.created > 0 {
            let relay = Arc::clone(&self.relay);
            tokio::spawn(async move {
                if let Err(error) = relay.ping_bing().await {
                    tracing::warn!(%error, "Bing sitemap ping failed");
                }
            });
        }

        tracing::info!(
            created = report.created,
            refreshed = report.refreshed,
            failed = report.failed.len(),
            pending = report.pending.succeeded(),
            "Behance sync finished"
        );

        Ok(report)
    }

    /// Create or refresh the project for one feed entry
    ///
    /// Returns whether the entry took a slot after the existing projects:
    /// a new project, or a known one whose cover is now mirrored.
    async fn apply_entry(
        &self,
        entry: &FeedEntry,
        id: &str,
        cover: &str,
        sort_order: i64,
        report: &mut SyncReport,
    ) -> Result<bool, AppError> {
        match self.db.get_project(id).await? {
            None => {
                let backup = self.mirror_cover(cover, id, &mut report.failed).await;
                let project = new_project(id, entry, cover, backup, sort_order);
                self.db.insert_project(&project).await?;
                tracing::info!(id, title = %project.title, "Created project from Behance");
                report.created += 1;
                Ok(true)
            }
            Some(existing) if existing.needs_backup() => {
                if existing.image_url != cover {
                    self.db.update_project_image_url(id, cover).await?;
                }
                let Some(backup) = self.mirror_cover(cover, id, &mut report.failed).await else {
                    return Ok(false);
                };
                self.db.set_project_backup_url(id, &backup).await?;
                report.refreshed += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Mirror a cover, remembering failures instead of aborting the run
    async fn mirror_cover(&self, cover: &str, id: &str, failed: &mut Vec<String>) -> Option<String> {
        match self.content.mirror_single(cover, Some(id)).await {
            Ok(object) => Some(object.public_url),
            Err(error) => {
                tracing::warn!(id, %error, "Cover mirror failed; keeping Behance URL");
                failed.push(id.to_string());
                None
            }
        }
    }
}

fn new_project(
    id: &str,
    entry: &FeedEntry,
    cover: &str,
    backup_image_url: Option<String>,
    sort_order: i64,
) -> Project {
    let now = Utc::now();
    Project {
        id: id.to_string(),
        slug: None,
        title: entry.title.clone(),
        category: entry
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        image_url: cover.to_string(),
        backup_image_url,
        link: entry.link.clone(),
        images: Vec::new(),
        sort_order,
        is_visible: None,
        created_at: now,
        updated_at: now,
    }
}
