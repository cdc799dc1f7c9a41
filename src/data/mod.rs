//! Data layer module
//!
//! Handles all data persistence:
//! - Content records (projects, posts)
//! - Stored object manifest

mod database;
mod models;

pub use database::Database;
pub use models::*;
