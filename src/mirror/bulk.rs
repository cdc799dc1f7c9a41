//! Sequential bulk mirroring
//!
//! Items are classified first, without touching the network, then the
//! remaining ones are mirrored strictly one at a time. A failing item is
//! recorded and the run moves on; items mirrored before a failure stay
//! mirrored.

use async_trait::async_trait;
use serde::Serialize;

use super::service::{MirrorService, MirroredObject};
use crate::error::AppError;
use crate::metrics::BULK_ITEMS_TOTAL;

/// Why an item was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// URL already points into the object store
    AlreadyMirrored,
    /// URL is a video embed, not an image
    Embed,
}

/// Substring rules for skipping URLs
#[derive(Debug, Clone)]
pub struct BulkClassifier {
    mirrored_marker: String,
    embed_markers: Vec<String>,
}

impl BulkClassifier {
    pub fn new(mirrored_marker: impl Into<String>, embed_markers: Vec<String>) -> Self {
        Self {
            mirrored_marker: mirrored_marker.into(),
            embed_markers,
        }
    }

    pub fn classify(&self, url: &str) -> Option<SkipReason> {
        if !self.mirrored_marker.is_empty() && url.contains(&self.mirrored_marker) {
            return Some(SkipReason::AlreadyMirrored);
        }
        if self
            .embed_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
        {
            return Some(SkipReason::Embed);
        }
        None
    }
}

/// One entry of a bulk run
///
/// `key` is whatever the caller needs to apply the result (a gallery
/// position, a content record reference).
#[derive(Debug, Clone)]
pub struct BulkItem<K> {
    pub key: K,
    pub entity_id: String,
    pub source_url: String,
}

/// Progress notification, sent before each mirrored item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkProgress {
    /// 1-based position among items that will be mirrored
    pub current: usize,
    pub total: usize,
}

/// Outcome of a bulk run
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport<K> {
    pub successes: Vec<(K, MirroredObject)>,
    pub failures: Vec<(K, String)>,
    pub skipped: Vec<(K, SkipReason)>,
}

impl<K> Default for BulkReport<K> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<K> BulkReport<K> {
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Items that were actually fetched
    pub fn attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Counts without the per-item payload
    pub fn summary(&self) -> BulkSummary {
        BulkSummary {
            attempted: self.attempted(),
            succeeded: self.success_count(),
            failed: self.failure_count(),
            skipped: self.skipped.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Split items into those to mirror and those to skip
pub fn partition<K>(
    classifier: &BulkClassifier,
    items: Vec<BulkItem<K>>,
) -> (Vec<BulkItem<K>>, Vec<(K, SkipReason)>) {
    items
        .into_iter()
        .fold((Vec::new(), Vec::new()), |(mut pending, mut skipped), item| {
            match classifier.classify(&item.source_url) {
                Some(reason) => skipped.push((item.key, reason)),
                None => pending.push(item),
            }
            (pending, skipped)
        })
}

/// Applies a mirrored object to the record that owns it
///
/// Called right after each successful upload, before the next item is
/// fetched. An error turns that item into a failure; the run continues.
#[async_trait]
pub trait BulkSink<K: Sync>: Send + Sync {
    async fn apply(&self, key: &K, object: &MirroredObject) -> Result<(), AppError>;

    /// Entity ID to name the object with, resolved just before the item
    /// is mirrored
    fn entity_id(&self, _key: &K, base: &str) -> String {
        base.to_string()
    }
}

/// Sink that keeps nothing; the report is the only output
struct Discard;

#[async_trait]
impl<K: Sync> BulkSink<K> for Discard {
    async fn apply(&self, _key: &K, _object: &MirroredObject) -> Result<(), AppError> {
        Ok(())
    }
}

/// Mirror every item that is not skipped, one at a time
pub async fn mirror_all<K: Sync>(
    service: &MirrorService,
    items: Vec<BulkItem<K>>,
    on_progress: impl FnMut(BulkProgress),
) -> BulkReport<K> {
    mirror_all_into(service, items, &Discard, on_progress).await
}

/// Like [`mirror_all`], handing each success to `sink` as it happens
pub async fn mirror_all_into<K: Sync>(
    service: &MirrorService,
    items: Vec<BulkItem<K>>,
    sink: &dyn BulkSink<K>,
    mut on_progress: impl FnMut(BulkProgress),
) -> BulkReport<K> {
    let (pending, skipped) = partition(service.classifier(), items);
    BULK_ITEMS_TOTAL
        .with_label_values(&["skipped"])
        .inc_by(skipped.len() as u64);

    let total = pending.len();
    let mut report = BulkReport {
        skipped,
        ..BulkReport::default()
    };

    for (index, item) in pending.into_iter().enumerate() {
        on_progress(BulkProgress {
            current: index + 1,
            total,
        });

        let entity_id = sink.entity_id(&item.key, &item.entity_id);
        let result = match service.mirror_image(&item.source_url, &entity_id).await {
            Ok(object) => match sink.apply(&item.key, &object).await {
                Ok(()) => Ok(object),
                Err(error) => {
                    tracing::warn!(
                        key = %object.key,
                        %error,
                        "Mirrored object could not be saved to its record"
                    );
                    Err(format!(
                        "uploaded as {} but not saved: {}",
                        object.public_url, error
                    ))
                }
            },
            Err(error) => {
                tracing::warn!(
                    source_url = %item.source_url,
                    %entity_id,
                    %error,
                    "Bulk mirror item failed; continuing"
                );
                Err(error.to_string())
            }
        };

        match result {
            Ok(object) => {
                BULK_ITEMS_TOTAL.with_label_values(&["success"]).inc();
                report.successes.push((item.key, object));
            }
            Err(message) => {
                BULK_ITEMS_TOTAL.with_label_values(&["failure"]).inc();
                report.failures.push((item.key, message));
            }
        }
    }

    tracing::info!(
        attempted = report.attempted(),
        succeeded = report.success_count(),
        failed = report.failure_count(),
        skipped = report.skipped.len(),
        "Bulk mirror completed"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::fetcher::{FetchedImage, MockRemoteFetcher};
    use crate::storage::MockObjectStore;
    use std::sync::Arc;

    fn classifier() -> BulkClassifier {
        BulkClassifier::new("abc.supabase.co", vec!["vimeo".to_string()])
    }

    fn store() -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_put().returning(|_, _, _| Ok(()));
        store
            .expect_public_url()
            .returning(|key| format!("https://abc.supabase.co/storage/v1/object/public/b/{key}"));
        store
    }

    fn items(urls: &[&str]) -> Vec<BulkItem<usize>> {
        urls.iter()
            .enumerate()
            .map(|(index, url)| BulkItem {
                key: index,
                entity_id: "gallery".to_string(),
                source_url: url.to_string(),
            })
            .collect()
    }

    #[test]
    fn classify_recognizes_mirrored_and_embeds() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify("https://abc.supabase.co/storage/v1/object/public/b/x.png"),
            Some(SkipReason::AlreadyMirrored)
        );
        assert_eq!(
            classifier.classify("https://player.vimeo.com/video/1"),
            Some(SkipReason::Embed)
        );
        assert_eq!(classifier.classify("https://example.com/x.png"), None);
    }

    #[tokio::test]
    async fn failing_item_does_not_stop_the_run() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().times(5).returning(|source| {
            if source.path() == "/3.png" {
                Err(AppError::UpstreamStatus {
                    status: 500,
                    url: source.to_string(),
                })
            } else {
                Ok(FetchedImage {
                    bytes: vec![1],
                    content_type: Some("image/png".to_string()),
                })
            }
        });
        let service = MirrorService::new(Arc::new(fetcher), Arc::new(store()), classifier());

        let urls = [
            "https://example.com/1.png",
            "https://example.com/2.png",
            "https://example.com/3.png",
            "https://example.com/4.png",
            "https://example.com/5.png",
        ];
        let mut progress = Vec::new();
        let report = mirror_all(&service, items(&urls), |p| progress.push(p)).await;

        assert_eq!(report.success_count(), 4);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failures[0].0, 2);
        let succeeded: Vec<usize> = report.successes.iter().map(|(key, _)| *key).collect();
        assert_eq!(succeeded, vec![0, 1, 3, 4]);
        assert_eq!(progress.len(), 5);
        assert_eq!(progress[4], BulkProgress { current: 5, total: 5 });
    }

    #[tokio::test]
    async fn mirrored_and_embed_urls_are_never_fetched() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|source| source.host_str() == Some("example.com"))
            .times(1)
            .returning(|_| {
                Ok(FetchedImage {
                    bytes: vec![1],
                    content_type: None,
                })
            });
        let service = MirrorService::new(Arc::new(fetcher), Arc::new(store()), classifier());

        let report = mirror_all(
            &service,
            items(&[
                "https://abc.supabase.co/storage/v1/object/public/b/old.png",
                "https://vimeo.com/123456",
                "https://example.com/new.png",
            ]),
            |_| {},
        )
        .await;

        assert_eq!(report.success_count(), 1);
        assert_eq!(
            report.skipped,
            vec![(0, SkipReason::AlreadyMirrored), (1, SkipReason::Embed)]
        );
        assert_eq!(
            report.summary(),
            BulkSummary {
                attempted: 1,
                succeeded: 1,
                failed: 0,
                skipped: 2,
            }
        );
    }

    #[tokio::test]
    async fn empty_input_completes_with_nothing_attempted() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().times(0);
        let service = MirrorService::new(Arc::new(fetcher), Arc::new(store()), classifier());

        let report = mirror_all(&service, Vec::<BulkItem<usize>>::new(), |_| {}).await;

        assert_eq!(report.attempted(), 0);
        assert!(report.is_clean());
    }

    /// Refuses to save odd keys and tags entity IDs with the key
    struct EvenOnly(std::sync::Mutex<Vec<usize>>);

    #[async_trait]
    impl BulkSink<usize> for EvenOnly {
        async fn apply(&self, key: &usize, _object: &MirroredObject) -> Result<(), AppError> {
            if key % 2 == 1 {
                return Err(AppError::NotFound);
            }
            self.0.lock().unwrap().push(*key);
            Ok(())
        }

        fn entity_id(&self, key: &usize, base: &str) -> String {
            format!("{base}_{key}")
        }
    }

    #[tokio::test]
    async fn sink_failure_is_reported_and_run_continues() {
        let mut fetcher = MockRemoteFetcher::new();
        fetcher.expect_fetch().times(3).returning(|_| {
            Ok(FetchedImage {
                bytes: vec![1],
                content_type: Some("image/png".to_string()),
            })
        });
        let service = MirrorService::new(Arc::new(fetcher), Arc::new(store()), classifier());
        let sink = EvenOnly(std::sync::Mutex::new(Vec::new()));

        let report = mirror_all_into(
            &service,
            items(&[
                "https://example.com/a.png",
                "https://example.com/b.png",
                "https://example.com/c.png",
            ]),
            &sink,
            |_| {},
        )
        .await;

        assert_eq!(*sink.0.lock().unwrap(), vec![0, 2]);
        let succeeded: Vec<usize> = report.successes.iter().map(|(key, _)| *key).collect();
        assert_eq!(succeeded, vec![0, 2]);
        assert!(report.successes[1].1.key.starts_with("gallery_2_"));
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failures[0].0, 1);
        assert!(report.failures[0].1.contains("not saved"));
    }
}
