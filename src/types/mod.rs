// Smart Bookmarks shared type definitions
// Each submodule defines types used across the crate.

pub mod bookmark;
pub mod broadcast;
pub mod errors;
pub mod metadata;
pub mod session;
pub mod settings;

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
