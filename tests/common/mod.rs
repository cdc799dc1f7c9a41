//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod upstream;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use studio_mirror::data::{Post, Project};
use studio_mirror::error::AppError;
use studio_mirror::storage::{ObjectStore, join_public_url};
use studio_mirror::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

use upstream::Upstream;

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";
pub const PUBLIC_BASE: &str = "https://media.test.example.com/project-images";

/// Object uploaded to the in-memory bucket
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory stand-in for the S3 bucket
pub struct MemoryStore {
    base: String,
    objects: Mutex<HashMap<String, StoredBlob>>,
    fail_uploads: AtomicBool,
}

impl MemoryStore {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            objects: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Make every following upload fail
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Object upload failed: quota exceeded".to_string()));
        }

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.base, key)
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub upstream: Upstream,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Production setup: the mirror fetches through this server's own
    /// `/api/proxy-image`
    pub async fn new() -> Self {
        Self::with_config(|_, _| {}).await
    }

    /// Create a test server, adjusting the configuration first
    pub async fn with_config(customize: impl FnOnce(&mut config::AppConfig, &Upstream)) -> Self {
        studio_mirror::metrics::init_metrics();

        let upstream = Upstream::start().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Bind first so the proxy endpoint can point back at this server
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();
        let addr = format!("http://{}", local_addr);

        let mut config = test_config(&local_addr.to_string(), db_path, &upstream);
        customize(&mut config, &upstream);

        let store = Arc::new(MemoryStore::new(PUBLIC_BASE));
        let state = AppState::with_store(config, store.clone()).await.unwrap();

        let app = studio_mirror::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            state,
            store,
            upstream,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn admin_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
    }

    pub fn admin_get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
    }

    /// Insert a project whose cover lives on the stub CDN
    pub async fn create_project(&self, id: &str, image_url: &str, images: Vec<String>) -> Project {
        let now = Utc::now();
        let project = Project {
            id: id.to_string(),
            slug: None,
            title: format!("Project {}", id),
            category: "Branding".to_string(),
            image_url: image_url.to_string(),
            backup_image_url: None,
            link: format!("https://www.behance.net/gallery/{}/project", id),
            images,
            sort_order: 0,
            is_visible: None,
            created_at: now,
            updated_at: now,
        };
        self.state.db.insert_project(&project).await.unwrap();
        project
    }

    pub async fn create_post(&self, id: &str, slug: &str, image_url: &str) -> Post {
        let post = Post {
            id: id.to_string(),
            slug: slug.to_string(),
            title_en: "Launch".to_string(),
            title_zh: "发布".to_string(),
            image_url: image_url.to_string(),
            backup_image_url: None,
            date: "2024-05-01".to_string(),
            sort_order: 0,
            is_visible: Some(true),
            created_at: Utc::now(),
        };
        self.state.db.insert_post(&post).await.unwrap();
        post
    }
}

/// Switch the mirror to development mode with a failing primary proxy
pub fn development(config: &mut config::AppConfig, upstream: &Upstream) {
    config.mirror.environment = config::MirrorEnvironment::Development;
    config.mirror.proxy_endpoint = Some(upstream.url("/broken-proxy"));
    config.mirror.public_relay = upstream.url("/relay");
}

fn test_config(host_port: &str, db_path: PathBuf, upstream: &Upstream) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: host_port.to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig { path: db_path },
        storage: config::StorageConfig {
            bucket: "project-images".to_string(),
            public_url: PUBLIC_BASE.to_string(),
            endpoint: Some("https://storage.test.example.com/s3".to_string()),
            account_id: None,
            region: "auto".to_string(),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
        },
        mirror: config::MirrorConfig {
            environment: config::MirrorEnvironment::Production,
            proxy_endpoint: None,
            cdn_host: "mir-s3-cdn-cf.behance.net".to_string(),
            cdn_rewrite_base: None,
            public_relay: upstream.url("/relay"),
            mirrored_marker: None,
            embed_markers: vec!["vimeo".to_string()],
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) StudioMirrorTest".to_string(),
            request_timeout_seconds: Some(5),
        },
        integrations: config::IntegrationsConfig {
            behance_username: "up-brands".to_string(),
            behance_feed_url: upstream.url("/feeds/user"),
            vimeo_oembed_url: upstream.url("/oembed"),
            bing_ping_url: upstream.url("/ping"),
            baidu_push_url: upstream.url("/baidu"),
            pushplus_url: upstream.url("/pushplus"),
            pushplus_token: None,
            sitemap_url: "https://www.up-brands.com/sitemap.xml".to_string(),
        },
        admin: config::AdminConfig {
            token: ADMIN_TOKEN.to_string(),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
