use serde::{Deserialize, Serialize};

/// A saved link as stored in the remote `bookmarks` collection.
///
/// `id` and `created_at` are assigned by the remote store and never change.
/// `open_count` and `last_opened_at` are touched only by open tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    #[serde(default)]
    pub open_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened_at: Option<i64>,
}

/// Fields of a record before the remote store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub description: String,
    pub image: String,
}
