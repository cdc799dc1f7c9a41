//! Proxy routes for fetching remote images
//!
//! The chain is resolved once from configuration. Production deployments
//! only ever use the self-hosted proxy; development deployments get one
//! extra attempt through either the CDN rewrite or the public relay.

use url::Url;

use crate::config::{AppConfig, MirrorEnvironment};
use crate::error::AppError;

/// One way of reaching a source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyStrategy {
    /// Self-hosted `/api/proxy-image` endpoint
    Primary { endpoint: Url },
    /// Dev server path rewrite onto a known CDN host
    DevCdnRewrite { cdn_host: String, rewrite_base: Url },
    /// Third-party CORS relay (rate limited)
    PublicRelay { endpoint: Url },
}

impl ProxyStrategy {
    /// Short label for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            ProxyStrategy::Primary { .. } => "primary",
            ProxyStrategy::DevCdnRewrite { .. } => "dev_cdn_rewrite",
            ProxyStrategy::PublicRelay { .. } => "public_relay",
        }
    }

    /// URL to request for `source`, or `None` when this route does not
    /// serve that host
    pub fn route(&self, source: &Url) -> Option<Url> {
        match self {
            ProxyStrategy::Primary { endpoint } | ProxyStrategy::PublicRelay { endpoint } => {
                let mut url = endpoint.clone();
                url.query_pairs_mut().append_pair("url", source.as_str());
                Some(url)
            }
            ProxyStrategy::DevCdnRewrite {
                cdn_host,
                rewrite_base,
            } => {
                let host = source.host_str()?;
                if !host.eq_ignore_ascii_case(cdn_host) {
                    return None;
                }

                let mut rewritten = format!(
                    "{}{}",
                    rewrite_base.as_str().trim_end_matches('/'),
                    source.path()
                );
                if let Some(query) = source.query() {
                    rewritten.push('?');
                    rewritten.push_str(query);
                }
                Url::parse(&rewritten).ok()
            }
        }
    }
}

/// Primary route plus the ordered fallbacks allowed after it fails
#[derive(Debug, Clone)]
pub struct ProxyChain {
    primary: ProxyStrategy,
    fallbacks: Vec<ProxyStrategy>,
}

impl ProxyChain {
    pub fn new(primary: ProxyStrategy, fallbacks: Vec<ProxyStrategy>) -> Self {
        Self { primary, fallbacks }
    }

    /// Build the chain for the configured environment
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let parse = |field: &str, raw: &str| {
            Url::parse(raw).map_err(|e| AppError::Config(format!("{} is not a valid URL: {}", field, e)))
        };

        let primary = ProxyStrategy::Primary {
            endpoint: parse(
                "mirror.proxy_endpoint",
                &config.mirror.proxy_endpoint_or(&config.server),
            )?,
        };

        let mut fallbacks = Vec::new();
        if config.mirror.environment == MirrorEnvironment::Development {
            if let Some(base) = &config.mirror.cdn_rewrite_base {
                fallbacks.push(ProxyStrategy::DevCdnRewrite {
                    cdn_host: config.mirror.cdn_host.clone(),
                    rewrite_base: parse("mirror.cdn_rewrite_base", base)?,
                });
            }
            fallbacks.push(ProxyStrategy::PublicRelay {
                endpoint: parse("mirror.public_relay", &config.mirror.public_relay)?,
            });
        }

        Ok(Self::new(primary, fallbacks))
    }

    pub fn primary(&self) -> &ProxyStrategy {
        &self.primary
    }

    /// First fallback that serves `source`
    pub fn fallback_for(&self, source: &Url) -> Option<(&ProxyStrategy, Url)> {
        self.fallbacks
            .iter()
            .find_map(|strategy| strategy.route(source).map(|url| (strategy, url)))
    }
}
