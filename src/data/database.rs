//! SQLite database operations
//!
//! All database access goes through this module.

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the file and parent directory when missing, then runs
    /// embedded migrations.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, AppError> {
        let row = sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Project::from))
    }

    /// All projects in display order
    pub async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT * FROM projects ORDER BY sort_order ASC, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Project::from).collect())
    }

    pub async fn project_exists(&self, id: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Insert a project
    ///
    /// Fails if the ID already exists.
    pub async fn insert_project(&self, project: &Project) -> Result<(), AppError> {
        let images = serde_json::to_string(&project.images)
            .map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, slug, title, category, image_url, backup_image_url, link,
                images, sort_order, is_visible, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.slug)
        .bind(&project.title)
        .bind(&project.category)
        .bind(&project.image_url)
        .bind(&project.backup_image_url)
        .bind(&project.link)
        .bind(images)
        .bind(project.sort_order)
        .bind(project.is_visible)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Highest `sort_order`, or 0 when there are no projects
    pub async fn max_project_sort_order(&self) -> Result<i64, AppError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(sort_order) FROM projects")
            .fetch_one(&self.pool)
            .await?;

        Ok(max.unwrap_or(0))
    }

    pub async fn update_project_image_url(&self, id: &str, image_url: &str) -> Result<(), AppError> {
        self.update_project_column(id, "image_url", image_url).await
    }

    pub async fn set_project_backup_url(&self, id: &str, backup_url: &str) -> Result<(), AppError> {
        self.update_project_column(id, "backup_image_url", backup_url)
            .await
    }

    /// Replace the gallery list
    pub async fn set_project_images(&self, id: &str, images: &[String]) -> Result<(), AppError> {
        let images = serde_json::to_string(images).map_err(|e| AppError::Internal(e.into()))?;
        self.update_project_column(id, "images", &images).await
    }

    async fn update_project_column(
        &self,
        id: &str,
        column: &'static str,
        value: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(&format!(
            "UPDATE projects SET {} = ?, updated_at = ? WHERE id = ?",
            column
        ))
        .bind(value)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Projects with a cover but no mirrored copy
    pub async fn projects_pending_backup(&self) -> Result<Vec<Project>, AppError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT * FROM projects
            WHERE image_url != '' AND (backup_image_url IS NULL OR backup_image_url = '')
            ORDER BY sort_order ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Project::from).collect())
    }

    #[cfg(test)]
    pub(crate) async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, slug, title_en, title_zh, image_url, backup_image_url,
                date, sort_order, is_visible, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.slug)
        .bind(&post.title_en)
        .bind(&post.title_zh)
        .bind(&post.image_url)
        .bind(&post.backup_image_url)
        .bind(&post.date)
        .bind(post.sort_order)
        .bind(post.is_visible)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_post_backup_url(&self, id: &str, backup_url: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE posts SET backup_image_url = ? WHERE id = ?")
            .bind(backup_url)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Posts with a cover but no mirrored copy
    pub async fn posts_pending_backup(&self) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE image_url != '' AND (backup_image_url IS NULL OR backup_image_url = '')
            ORDER BY sort_order ASC, date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    // =========================================================================
    // Stored object manifest
    // =========================================================================

    /// Record an uploaded object
    ///
    /// Uploads overwrite on key conflict, so the manifest does too.
    pub async fn record_stored_object(&self, object: &StoredObject) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO stored_objects (
                key, entity_id, source_url, public_url, content_type, size_bytes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&object.key)
        .bind(&object.entity_id)
        .bind(&object.source_url)
        .bind(&object.public_url)
        .bind(&object.content_type)
        .bind(object.size_bytes)
        .bind(object.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Manifest entries, newest first, optionally for one entity
    pub async fn list_stored_objects(
        &self,
        entity_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<StoredObject>, AppError> {
        let objects = match entity_id {
            Some(entity_id) => {
                sqlx::query_as::<_, StoredObject>(
                    "SELECT * FROM stored_objects WHERE entity_id = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(entity_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StoredObject>(
                    "SELECT * FROM stored_objects ORDER BY created_at DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(objects)
    }
}
