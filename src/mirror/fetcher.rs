//! Remote image fetching through the proxy chain

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::proxy::{ProxyChain, ProxyStrategy};
use crate::error::AppError;
use crate::metrics::FETCH_ATTEMPTS_TOTAL;

/// Raw bytes and declared content type of a fetched image
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Source of remote image bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, source: &Url) -> Result<FetchedImage, AppError>;
}

/// `reqwest`-backed fetcher walking a [`ProxyChain`]
///
/// One attempt on the primary route, then at most one attempt on the
/// first fallback that serves the source host. No retries.
pub struct HttpFetcher {
    client: reqwest::Client,
    chain: ProxyChain,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, chain: ProxyChain) -> Self {
        Self { client, chain }
    }

    /// Build the client used for proxy calls
    ///
    /// Without `timeout` the client waits on a slow upstream indefinitely.
    pub fn build_client(
        user_agent: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Client, AppError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| AppError::Internal(e.into()))
    }

    async fn attempt(&self, strategy: &ProxyStrategy, url: Url) -> Result<FetchedImage, AppError> {
        let result = self.get(url.clone()).await;

        let outcome = match &result {
            Ok(_) => "success".to_string(),
            Err(error) => error
                .upstream_status()
                .map(|status| status.to_string())
                .unwrap_or_else(|| "error".to_string()),
        };
        FETCH_ATTEMPTS_TOTAL
            .with_label_values(&[strategy.name(), &outcome])
            .inc();

        result
    }

    async fn get(&self, url: Url) -> Result<FetchedImage, AppError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let bytes = response.bytes().await?.to_vec();

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, source: &Url) -> Result<FetchedImage, AppError> {
        let primary = self.chain.primary();
        let primary_url = primary.route(source).ok_or_else(|| {
            AppError::Validation(format!("primary proxy cannot route {}", source))
        })?;

        let primary_error = match self.attempt(primary, primary_url).await {
            Ok(image) => return Ok(image),
            Err(error) => error,
        };

        let Some((strategy, fallback_url)) = self.chain.fallback_for(source) else {
            return Err(primary_error);
        };

        tracing::warn!(
            source = %source,
            error = %primary_error,
            fallback = strategy.name(),
            "Primary image proxy failed; trying fallback"
        );

        self.attempt(strategy, fallback_url).await
    }
}
