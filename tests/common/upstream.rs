//! Stub third-party servers for E2E tests
//!
//! One axum app on an ephemeral port plays the image CDN, a broken
//! self-hosted proxy, the public relays, Behance, Vimeo, Bing, Baidu and
//! PushPlus.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nstub-png";
pub const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0stub-jpeg";
pub const RELAY_BYTES: &[u8] = b"RIFF\x00\x00\x00\x00WEBPstub";

/// Request counters
#[derive(Default)]
pub struct Hits {
    pub cdn: AtomicUsize,
    pub relay: AtomicUsize,
    pub broken_proxy: AtomicUsize,
    pub bing: AtomicUsize,
    pub pushplus: Mutex<Vec<serde_json::Value>>,
}

impl Hits {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct StubState {
    base: String,
    hits: Arc<Hits>,
}

/// Running stub upstream
pub struct Upstream {
    pub base: String,
    pub hits: Arc<Hits>,
}

impl Upstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(Hits::default());

        let app = Router::new()
            .route("/cdn/:name", get(cdn_image))
            .route("/cdn-rewrite/cdn/:name", get(cdn_image))
            .route("/broken-proxy", get(broken_proxy))
            .route("/relay", get(relay))
            .route("/throttled-relay", get(throttled_relay))
            .route("/feeds/user", get(behance_feed))
            .route("/oembed", get(oembed))
            .route("/ping", get(bing_ping))
            .route("/baidu", post(baidu_push))
            .route("/pushplus", post(pushplus))
            .with_state(StubState {
                base: base.clone(),
                hits: Arc::clone(&hits),
            });

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn cdn_image(State(state): State<StubState>, Path(name): Path<String>) -> Response {
    state.hits.cdn.fetch_add(1, Ordering::SeqCst);

    match name.as_str() {
        "logo.png" => ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response(),
        "photo.jpg" => ([(header::CONTENT_TYPE, "image/jpeg")], JPEG_BYTES).into_response(),
        "vector.svg" => (
            [(header::CONTENT_TYPE, "image/svg+xml")],
            "<svg xmlns=\"http://www.w3.org/2000/svg\"/>",
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn broken_proxy(State(state): State<StubState>) -> StatusCode {
    state.hits.broken_proxy.fetch_add(1, Ordering::SeqCst);
    StatusCode::SERVICE_UNAVAILABLE
}

async fn relay(State(state): State<StubState>) -> Response {
    state.hits.relay.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/webp")], RELAY_BYTES).into_response()
}

async fn throttled_relay() -> StatusCode {
    StatusCode::TOO_MANY_REQUESTS
}

#[derive(Deserialize)]
struct FeedQuery {
    username: String,
    t: Option<String>,
}

async fn behance_feed(State(state): State<StubState>, Query(query): Query<FeedQuery>) -> Response {
    if query.t.is_none() {
        return (StatusCode::BAD_REQUEST, "missing cache buster").into_response();
    }
    if query.username == "nobody" {
        return (
            [(header::CONTENT_TYPE, "application/rss+xml")],
            "<?xml version=\"1.0\"?><rss><channel><title>empty</title></channel></rss>",
        )
            .into_response();
    }

    let base = &state.base;
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Behance :: {user}</title>
    <item>
      <title><![CDATA[Tea House Identity]]></title>
      <link>https://www.behance.net/gallery/111/Tea-House-Identity</link>
      <description><![CDATA[<img src="{base}/cdn/photo.jpg" /><br/>Packaging]]></description>
      <category>Packaging</category>
    </item>
    <item>
      <title>Coffee &amp; Co</title>
      <link>https://www.behance.net/gallery/222/Coffee-Co</link>
      <description>&lt;img src=&quot;{base}/cdn/logo.png&quot; /&gt;</description>
    </item>
    <item>
      <title>Lost Files</title>
      <link>https://www.behance.net/gallery/333/Lost-Files</link>
      <description><![CDATA[<img src="{base}/cdn/missing.png" />]]></description>
    </item>
    <item>
      <title>Moodboard</title>
      <link>https://www.behance.net/moodboard/444/Board</link>
      <description><![CDATA[<img src="{base}/cdn/logo.png" />]]></description>
    </item>
  </channel>
</rss>"#,
        user = query.username,
        base = base,
    );

    ([(header::CONTENT_TYPE, "application/rss+xml")], xml).into_response()
}

#[derive(Deserialize)]
struct OembedQuery {
    url: String,
}

async fn oembed(Query(query): Query<OembedQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "type": "video",
        "title": "Showreel",
        "url": query.url,
        "thumbnail_url": "https://i.vimeocdn.com/video/1_640.jpg",
    }))
}

async fn bing_ping(State(state): State<StubState>) -> StatusCode {
    state.hits.bing.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn baidu_push(body: String) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": body.lines().count(), "remain": 99 }))
}

async fn pushplus(
    State(state): State<StubState>,
    Json(payload): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    state.hits.pushplus.lock().unwrap().push(payload);
    Json(serde_json::json!({ "code": 200, "msg": "ok" }))
}
