//! Single-image mirroring: fetch, upload, resolve

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use url::Url;

use super::bulk::BulkClassifier;
use super::content_type::{effective_content_type, extension_for};
use super::fetcher::RemoteFetcher;
use crate::error::AppError;
use crate::metrics::{BYTES_UPLOADED, MIRROR_RESULTS_TOTAL};
use crate::storage::ObjectStore;

/// An image that now lives in the object store
#[derive(Debug, Clone, Serialize)]
pub struct MirroredObject {
    /// Object key, `{entity_id}_{millis}.{ext}`
    pub key: String,
    pub public_url: String,
    pub entity_id: String,
    pub source_url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Strictly increasing millisecond timestamps
///
/// Two keys minted by the same process never share a timestamp, even when
/// the wall clock has not advanced between calls.
#[derive(Debug, Default)]
pub struct KeyClock {
    last: AtomicI64,
}

impl KeyClock {
    pub fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

/// Fetches remote images and re-hosts them in the object store
pub struct MirrorService {
    fetcher: Arc<dyn RemoteFetcher>,
    store: Arc<dyn ObjectStore>,
    classifier: BulkClassifier,
    clock: KeyClock,
}

impl MirrorService {
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        store: Arc<dyn ObjectStore>,
        classifier: BulkClassifier,
    ) -> Self {
        Self {
            fetcher,
            store,
            classifier,
            clock: KeyClock::default(),
        }
    }

    /// Rules deciding which URLs bulk runs leave alone
    pub fn classifier(&self) -> &BulkClassifier {
        &self.classifier
    }

    /// Mirror one image
    ///
    /// Every call stores a new object: mirroring the same source twice
    /// yields two keys and two URLs.
    ///
    /// # Errors
    /// - `Validation` when `source_url` is not an absolute URL
    /// - upstream errors from the fetcher, carrying the HTTP status
    /// - `Storage` when the upload fails
    pub async fn mirror_image(
        &self,
        source_url: &str,
        entity_id: &str,
    ) -> Result<MirroredObject, AppError> {
        let result = self.mirror_inner(source_url, entity_id).await;

        match &result {
            Ok(object) => {
                MIRROR_RESULTS_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!(
                    entity_id,
                    key = %object.key,
                    size_bytes = object.size_bytes,
                    "Image mirrored"
                );
            }
            Err(error) => {
                MIRROR_RESULTS_TOTAL.with_label_values(&["failure"]).inc();
                tracing::error!(entity_id, source_url, %error, "Image mirror failed");
            }
        }

        result
    }

    async fn mirror_inner(
        &self,
        source_url: &str,
        entity_id: &str,
    ) -> Result<MirroredObject, AppError> {
        let source = Url::parse(source_url.trim())
            .map_err(|e| AppError::Validation(format!("invalid source url: {}", e)))?;

        let fetched = self.fetcher.fetch(&source).await?;

        let header = fetched.content_type.as_deref();
        let content_type = effective_content_type(header).to_string();
        let millis = self.clock.next_millis();
        let key = format!("{}_{}.{}", entity_id, millis, extension_for(header));
        let size_bytes = fetched.bytes.len() as u64;

        self.store.put(&key, fetched.bytes, &content_type).await?;
        BYTES_UPLOADED.inc_by(size_bytes as f64);

        let public_url = self.store.public_url(&key);
        let created_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(MirroredObject {
            key,
            public_url,
            entity_id: entity_id.to_string(),
            source_url: source.to_string(),
            content_type,
            size_bytes,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::fetcher::{FetchedImage, MockRemoteFetcher};
    use crate::storage::MockObjectStore;

    const PUBLIC_BASE: &str = "https://abc.supabase.co/storage/v1/object/public/project-images";

    fn store_accepting_everything() -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_put().returning(|_, _, _| Ok(()));
        store
            .expect_public_url()
            .returning(|key| crate::storage::join_public_url(PUBLIC_BASE, key));
        store
    }

    fn png_fetcher() -> MockRemoteFetcher {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Ok(FetchedImage {
                bytes: vec![0x89, b'P', b'N', b'G'],
                content_type: Some("image/png".to_string()),
            })
        });
        fetcher
    }

    fn service(fetcher: MockRemoteFetcher, store: MockObjectStore) -> MirrorService {
        MirrorService::new(
            Arc::new(fetcher),
            Arc::new(store),
            BulkClassifier::new("abc.supabase.co", vec!["vimeo".to_string()]),
        )
    }

    #[test]
    fn key_clock_is_strictly_increasing() {
        let clock = KeyClock::default();
        let first = clock.next_millis();
        let second = clock.next_millis();
        let third = clock.next_millis();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn mirrored_url_points_at_public_domain() {
        let service = service(png_fetcher(), store_accepting_everything());

        let object = service
            .mirror_image("https://mir-s3-cdn-cf.behance.net/projects/404/a.png", "1234")
            .await
            .unwrap();

        assert!(object.public_url.starts_with(PUBLIC_BASE));
        assert!(object.key.starts_with("1234_"));
        assert!(object.key.ends_with(".png"));
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.size_bytes, 4);
    }

    #[tokio::test]
    async fn mirroring_twice_creates_two_objects() {
        let service = service(png_fetcher(), store_accepting_everything());
        let source = "https://mir-s3-cdn-cf.behance.net/projects/404/a.png";

        let first = service.mirror_image(source, "1234").await.unwrap();
        let second = service.mirror_image(source, "1234").await.unwrap();

        assert_ne!(first.key, second.key);
        assert_ne!(first.public_url, second.public_url);
    }

    #[tokio::test]
    async fn missing_content_type_uploads_as_jpeg() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Ok(FetchedImage {
                bytes: vec![1, 2, 3],
                content_type: None,
            })
        });

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|key, _, content_type| key.ends_with(".jpg") && content_type == "image/jpeg")
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_public_url()
            .returning(|key| crate::storage::join_public_url(PUBLIC_BASE, key));

        let object = service(fetcher, store)
            .mirror_image("https://example.com/cover", "p1")
            .await;
        tokio_test::assert_ok!(object);
    }

    #[tokio::test]
    async fn upstream_status_is_propagated() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().returning(|source| {
            Err(AppError::UpstreamStatus {
                status: 403,
                url: source.to_string(),
            })
        });
        let mut store = MockObjectStore::new();
        store.expect_put().times(0);

        let error = service(fetcher, store)
            .mirror_image("https://example.com/cover.png", "p1")
            .await
            .unwrap_err();

        assert!(error.to_string().contains("403"));
    }

    #[tokio::test]
    async fn storage_failure_is_returned_unclassified() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .returning(|_, _, _| Err(AppError::Storage("quota exceeded".to_string())));

        let result = service(png_fetcher(), store)
            .mirror_image("https://example.com/cover.png", "p1")
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn relative_source_is_rejected_before_fetching() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().times(0);

        let result = service(fetcher, MockObjectStore::new())
            .mirror_image("/images/cover.png", "p1")
            .await;

        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
