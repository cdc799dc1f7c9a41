//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub mirror: MirrorConfig,
    pub integrations: IntegrationsConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "www.example-studio.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the site
    ///
    /// # Returns
    /// Full URL like "https://www.example-studio.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Object store configuration (any S3-compatible endpoint)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket that receives mirrored images
    pub bucket: String,
    /// Public URL base for the bucket
    /// e.g., "https://abc.supabase.co/storage/v1/object/public/project-images"
    pub public_url: String,
    /// Explicit S3 endpoint. Takes precedence over `account_id`.
    pub endpoint: Option<String>,
    /// Cloudflare account ID, used to derive the R2 endpoint
    pub account_id: Option<String>,
    /// Signing region ("auto" for R2)
    #[serde(default = "default_storage_region")]
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

fn default_storage_region() -> String {
    "auto".to_string()
}

impl StorageConfig {
    /// Resolve the S3 API endpoint
    ///
    /// R2 endpoint: https://{account_id}.r2.cloudflarestorage.com
    pub fn endpoint_url(&self) -> Result<String, crate::error::AppError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(endpoint) = endpoint {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }

        match self.account_id.as_deref().map(str::trim) {
            Some(account_id) if !account_id.is_empty() => {
                Ok(format!("https://{}.r2.cloudflarestorage.com", account_id))
            }
            _ => Err(crate::error::AppError::Config(
                "storage.endpoint or storage.account_id is required".to_string(),
            )),
        }
    }

    /// Host of the public URL, e.g. "abc.supabase.co"
    pub fn public_host(&self) -> Option<String> {
        url::Url::parse(&self.public_url)
            .ok()
            .and_then(|url| url.host_str().map(|host| host.to_ascii_lowercase()))
    }
}

/// Which fallback routes the fetcher may use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MirrorEnvironment {
    /// Primary proxy only
    #[default]
    Production,
    /// Primary proxy, then the CDN rewrite or public relay
    Development,
}

/// Mirror pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub environment: MirrorEnvironment,
    /// Self-hosted proxy endpoint.
    ///
    /// Defaults to `{server.base_url}/api/proxy-image`.
    pub proxy_endpoint: Option<String>,
    /// CDN host served by the development rewrite
    #[serde(default = "default_cdn_host")]
    pub cdn_host: String,
    /// Development server prefix that rewrites to `cdn_host`
    /// e.g., "http://localhost:5173/behance-cdn"
    pub cdn_rewrite_base: Option<String>,
    /// Public CORS relay used as a last resort in development
    #[serde(default = "default_public_relay")]
    pub public_relay: String,
    /// Substring identifying URLs that already live in the object store.
    ///
    /// Defaults to the host of `storage.public_url`.
    pub mirrored_marker: Option<String>,
    /// Substrings identifying video embeds that are never mirrored
    #[serde(default = "default_embed_markers")]
    pub embed_markers: Vec<String>,
    /// User-Agent presented by the image proxy and the relays
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Optional fetch timeout. Unset means the client never times out.
    pub request_timeout_seconds: Option<u64>,
}

fn default_cdn_host() -> String {
    "mir-s3-cdn-cf.behance.net".to_string()
}

fn default_public_relay() -> String {
    "https://api.allorigins.win/raw".to_string()
}

fn default_embed_markers() -> Vec<String> {
    vec!["vimeo".to_string()]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

impl MirrorConfig {
    /// Primary proxy endpoint, falling back to this server's own route
    pub fn proxy_endpoint_or(&self, server: &ServerConfig) -> String {
        self.proxy_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("{}/api/proxy-image", server.base_url()))
    }

    /// Marker used to recognize already-mirrored URLs
    pub fn mirrored_marker_or(&self, storage: &StorageConfig) -> String {
        self.mirrored_marker
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| storage.public_host())
            .unwrap_or_else(|| storage.public_url.clone())
    }
}

/// Third-party endpoints the relays talk to
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationsConfig {
    /// Behance account synced into projects
    pub behance_username: String,
    pub behance_feed_url: String,
    pub vimeo_oembed_url: String,
    pub bing_ping_url: String,
    pub baidu_push_url: String,
    pub pushplus_url: String,
    /// PushPlus token; lead notifications are dropped when unset
    pub pushplus_token: Option<String>,
    /// Sitemap announced to search engines
    pub sitemap_url: String,
}

/// Admin API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for /admin and /metrics
    pub token: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (STUDIO_MIRROR__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/studio-mirror.db")?
            .set_default("storage.bucket", "project-images")?
            .set_default("mirror.environment", "production")?
            .set_default("integrations.behance_username", "up-brands")?
            .set_default(
                "integrations.behance_feed_url",
                "https://www.behance.net/feeds/user",
            )?
            .set_default(
                "integrations.vimeo_oembed_url",
                "https://vimeo.com/api/oembed.json",
            )?
            .set_default("integrations.bing_ping_url", "https://www.bing.com/ping")?
            .set_default("integrations.baidu_push_url", "http://data.zz.baidu.com/urls")?
            .set_default("integrations.pushplus_url", "http://www.pushplus.plus/send")?
            .set_default(
                "integrations.sitemap_url",
                "https://www.up-brands.com/sitemap.xml",
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("STUDIO_MIRROR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        const MIN_ADMIN_TOKEN_BYTES: usize = 16;

        if self.admin.token.trim().len() < MIN_ADMIN_TOKEN_BYTES {
            return Err(AppError::Config(format!(
                "admin.token must be at least {} bytes",
                MIN_ADMIN_TOKEN_BYTES
            )));
        }

        if self.storage.public_host().is_none() {
            return Err(AppError::Config(
                "storage.public_url must be an absolute URL with a host".to_string(),
            ));
        }
        self.storage.endpoint_url()?;

        let proxy_endpoint = self.mirror.proxy_endpoint_or(&self.server);
        url::Url::parse(&proxy_endpoint).map_err(|e| {
            AppError::Config(format!("mirror.proxy_endpoint is not a valid URL: {}", e))
        })?;

        if self.mirror.environment == MirrorEnvironment::Development {
            url::Url::parse(&self.mirror.public_relay).map_err(|e| {
                AppError::Config(format!("mirror.public_relay is not a valid URL: {}", e))
            })?;
            if let Some(base) = &self.mirror.cdn_rewrite_base {
                url::Url::parse(base).map_err(|e| {
                    AppError::Config(format!("mirror.cdn_rewrite_base is not a valid URL: {}", e))
                })?;
            }
        }

        Ok(())
    }
}
