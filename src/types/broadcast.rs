use serde::{Deserialize, Serialize};

use super::bookmark::BookmarkRecord;

/// Message exchanged between tabs of the same origin. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    Added {
        item: BookmarkRecord,
    },
    Updated {
        item: BookmarkRecord,
    },
    Deleted {
        id: String,
    },
    Tracked {
        id: String,
        open_count: u32,
        last_opened_at: i64,
    },
    /// Local state may be stale; reload from the remote store.
    Refetch,
}

impl BroadcastEvent {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastEvent::Added { .. } => "added",
            BroadcastEvent::Updated { .. } => "updated",
            BroadcastEvent::Deleted { .. } => "deleted",
            BroadcastEvent::Tracked { .. } => "tracked",
            BroadcastEvent::Refetch => "refetch",
        }
    }
}

/// Value written under the channel key by the shared-storage fallback.
///
/// `v` is a millisecond timestamp so consecutive writes of the same payload
/// still produce a distinct value and fire a storage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEnvelope {
    pub v: i64,
    pub payload: BroadcastEvent,
}

/// Kind of row change reported by the remote store's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change notification. Carries no diff; receivers refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub user_id: String,
    pub kind: ChangeKind,
}
