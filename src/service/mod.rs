//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the mirror pipeline, the database and outbound
//! third-party calls.

mod behance;
mod content;
pub mod feed;
mod relay;

pub use behance::{BehanceSync, SyncReport};
pub use content::{ContentBackupService, GalleryBackup, PendingBackup};
pub use relay::{BaiduPushResponse, RelayClient};
