//! API layer
//!
//! HTTP handlers for:
//! - Image proxy and third-party relays (public, under `/api`)
//! - Admin API
//! - Metrics (Prometheus)

mod admin;
pub mod metrics;
mod proxy;
mod relay;

pub use admin::admin_router;
pub use metrics::metrics_router;
pub use proxy::proxy_router;
pub use relay::relay_router;
