//! Image mirroring pipeline
//!
//! ```text
//! source url ──► RemoteFetcher (proxy chain) ──► bytes + content type
//!                                                   │
//!            public url ◄── ObjectStore::public_url ◄┘ ObjectStore::put
//! ```
//!
//! - `proxy`: proxy routes and the chain built at startup
//! - `fetcher`: HTTP fetch with a single fallback attempt
//! - `content_type`: extension derivation
//! - `service`: one image end to end
//! - `bulk`: sequential runs over many images

pub mod bulk;
pub mod content_type;
mod fetcher;
mod proxy;
mod service;

pub use bulk::{
    BulkClassifier, BulkItem, BulkProgress, BulkReport, BulkSink, BulkSummary, SkipReason,
    mirror_all, mirror_all_into,
};
pub use fetcher::{FetchedImage, HttpFetcher, RemoteFetcher};
pub use proxy::{ProxyChain, ProxyStrategy};
pub use service::{KeyClock, MirrorService, MirroredObject};
