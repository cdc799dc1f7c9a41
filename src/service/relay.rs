//! Outbound calls to third-party services
//!
//! Used by the `/api/*` relay endpoints and by the Behance sync.

use chrono::Utc;
use serde::Deserialize;

use crate::config::IntegrationsConfig;
use crate::error::AppError;
use crate::metrics::RELAY_REQUESTS_TOTAL;
use crate::mirror::FetchedImage;

use super::feed::looks_like_xml;

/// Relay client
pub struct RelayClient {
    client: reqwest::Client,
    config: IntegrationsConfig,
}

/// Payload accepted by PushPlus
#[derive(Debug, serde::Serialize)]
struct PushPlusMessage<'a> {
    token: &'a str,
    title: &'a str,
    content: String,
    template: &'a str,
}

/// Baidu push answer; passed through as-is
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct BaiduPushResponse(pub serde_json::Value);

impl RelayClient {
    /// Create a relay client
    ///
    /// `client` should present a browser User-Agent; several upstreams
    /// reject unknown agents.
    pub fn new(client: reqwest::Client, config: IntegrationsConfig) -> Self {
        Self { client, config }
    }

    /// Fetch an arbitrary image on behalf of a browser
    pub async fn fetch_image(&self, url: &str) -> Result<FetchedImage, AppError> {
        let target = url::Url::parse(url)
            .map_err(|e| AppError::Validation(format!("invalid url parameter: {}", e)))?;

        let response = self.client.get(target.clone()).send().await?;
        let status = response.status();
        observe("proxy_image", status.as_u16());
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: target.to_string(),
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

    /// Fetch a user's Behance RSS feed
    ///
    /// A timestamp query parameter defeats Behance's server-side cache.
    pub async fn behance_feed(&self, username: &str) -> Result<String, AppError> {
        let mut url = url::Url::parse(&self.config.behance_feed_url)
            .map_err(|e| AppError::Config(format!("integrations.behance_feed_url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("username", username)
            .append_pair("t", &Utc::now().timestamp_millis().to_string());

        tracing::info!(%url, "Fetching Behance RSS");

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache, no-store")
            .send()
            .await?;
        let status = response.status();
        observe("behance_rss", status.as_u16());
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        if !looks_like_xml(&body) {
            let preview: String = body.chars().take(100).collect();
            tracing::warn!(%preview, "Behance response does not look like XML");
        }

        Ok(body)
    }

    /// Vimeo oEmbed metadata for a video URL
    pub async fn vimeo_oembed(&self, video_url: &str) -> Result<serde_json::Value, AppError> {
        let mut url = url::Url::parse(&self.config.vimeo_oembed_url)
            .map_err(|e| AppError::Config(format!("integrations.vimeo_oembed_url: {}", e)))?;
        url.query_pairs_mut().append_pair("url", video_url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        observe("vimeo_oembed", status.as_u16());
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<serde_json::Value>().await?)
    }

    /// Ask Bing to recrawl the sitemap
    ///
    /// Bing's answer body is ignored; only transport errors fail.
    pub async fn ping_bing(&self) -> Result<(), AppError> {
        let mut url = url::Url::parse(&self.config.bing_ping_url)
            .map_err(|e| AppError::Config(format!("integrations.bing_ping_url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("sitemap", &self.config.sitemap_url);

        let response = self.client.get(url).send().await?;
        observe("bing_ping", response.status().as_u16());
        Ok(())
    }

    /// Push a URL to Baidu's link submission API
    pub async fn push_baidu(
        &self,
        site: &str,
        token: &str,
        page_url: &str,
    ) -> Result<BaiduPushResponse, AppError> {
        let mut url = url::Url::parse(&self.config.baidu_push_url)
            .map_err(|e| AppError::Config(format!("integrations.baidu_push_url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("site", site)
            .append_pair("token", token);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(page_url.to_string())
            .send()
            .await?;
        observe("baidu_push", response.status().as_u16());

        Ok(response.json::<BaiduPushResponse>().await?)
    }

    /// Forward a new lead to WeChat through PushPlus
    ///
    /// Returns `false` without sending anything when no token is configured.
    pub async fn notify_lead(&self, contact: &str, message: &str) -> Result<bool, AppError> {
        let Some(token) = self
            .config
            .pushplus_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
        else {
            tracing::debug!("PushPlus token not configured; lead notification skipped");
            return Ok(false);
        };

        let payload = PushPlusMessage {
            token,
            title: "New Lead from Up-Brands",
            content: format!("Contact: {}\n\nHistory:\n{}", contact, message),
            template: "txt",
        };

        let response = self
            .client
            .post(&self.config.pushplus_url)
            .json(&payload)
            .send()
            .await?;
        observe("pushplus", response.status().as_u16());

        Ok(true)
    }
}

fn observe(relay: &str, status: u16) {
    RELAY_REQUESTS_TOTAL
        .with_label_values(&[relay, &status.to_string()])
        .inc();
}
