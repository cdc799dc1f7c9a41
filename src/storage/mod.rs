//! Object storage module
//!
//! Handles:
//! - Uploading mirrored images to an S3-compatible public bucket
//! - Public URL resolution for stored objects

mod media;

pub use media::MediaStorage;

use async_trait::async_trait;

use crate::error::AppError;

/// Bucket abstraction used by the mirror pipeline
///
/// `put` overwrites any existing object under the same key. There is no
/// versioning and no conflict detection: last write wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `data` under `key`
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// Public, unsigned URL for `key`
    fn public_url(&self, key: &str) -> String;
}

/// Join a public base URL and an object key
///
/// The key is percent-encoded as a single path segment.
pub fn join_public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(key)
    )
}

pub(crate) fn build_r2_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_only()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_joins_base_and_key() {
        assert_eq!(
            join_public_url("https://cdn.example.com/bucket/", "123_1700000000000.png"),
            "https://cdn.example.com/bucket/123_1700000000000.png"
        );
    }

    #[test]
    fn public_url_encodes_unusual_extensions() {
        let url = join_public_url("https://cdn.example.com", "logo_1.svg+xml");
        assert_eq!(url, "https://cdn.example.com/logo_1.svg%2Bxml");
    }
}
