//! Admin authentication
//!
//! A single shared bearer token guards every admin route.

mod middleware;

pub use middleware::{AdminUser, require_admin};
