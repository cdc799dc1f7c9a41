//! Studio Mirror - image mirroring backend for a branding studio site
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Image proxy and third-party relays                       │
//! │  - Admin endpoints (bearer token)                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Content backup (covers, galleries, pending sweep)        │
//! │  - Behance sync                                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Mirror Pipeline                          │
//! │  - Proxy chain fetch, content type, key, upload             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - S3-compatible object storage                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `mirror`: Fetch and re-host pipeline
//! - `data`: Database layer
//! - `storage`: Object storage
//! - `auth`: Admin token authentication
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod mirror;
pub mod service;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Image mirror pipeline
    pub mirror: Arc<mirror::MirrorService>,

    /// Cover, gallery and pending backups
    pub content: Arc<service::ContentBackupService>,

    /// Behance feed sync
    pub behance: Arc<service::BehanceSync>,

    /// Outbound third-party calls
    pub relay: Arc<service::RelayClient>,
}

impl AppState {
    /// Initialize application state against the configured bucket
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let store = storage::MediaStorage::new(&config.storage).await?;
        tracing::info!(bucket = %config.storage.bucket, "Object storage initialized");

        Self::with_store(config, Arc::new(store)).await
    }

    /// Initialize application state with a given object store
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Build the HTTP client and proxy chain
    /// 3. Wire the mirror pipeline and services
    pub async fn with_store(
        config: config::AppConfig,
        store: Arc<dyn storage::ObjectStore>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(std::path::Path::new(&config.database.path)).await?);
        tracing::info!("Database connected");

        // 2. HTTP client and proxy chain
        let timeout = config.mirror.request_timeout_seconds.map(Duration::from_secs);
        let http_client = mirror::HttpFetcher::build_client(&config.mirror.user_agent, timeout)?;

        let chain = mirror::ProxyChain::from_config(&config)?;
        tracing::info!(
            environment = ?config.mirror.environment,
            primary = chain.primary().name(),
            "Proxy chain resolved"
        );

        // 3. Pipeline and services
        let classifier = mirror::BulkClassifier::new(
            config.mirror.mirrored_marker_or(&config.storage),
            config.mirror.embed_markers.clone(),
        );
        let fetcher = Arc::new(mirror::HttpFetcher::new(http_client.clone(), chain));
        let mirror = Arc::new(mirror::MirrorService::new(fetcher, store, classifier));
        let content = Arc::new(service::ContentBackupService::new(
            Arc::clone(&db),
            Arc::clone(&mirror),
        ));
        let relay = Arc::new(service::RelayClient::new(
            http_client,
            config.integrations.clone(),
        ));
        let behance = Arc::new(service::BehanceSync::new(
            Arc::clone(&db),
            Arc::clone(&content),
            Arc::clone(&relay),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            mirror,
            content,
            behance,
            relay,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    let admin = Router::new()
        .nest("/admin", api::admin_router())
        .merge(api::metrics_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::proxy_router().merge(api::relay_router()))
        .merge(admin)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
