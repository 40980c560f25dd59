use serde::{Deserialize, Serialize};

/// Name of the broadcast channel and of the shared-storage key used for
/// cross-tab messages. Every participant must agree on it.
pub const DEFAULT_CHANNEL_NAME: &str = "smart-bookmarks-channel";

/// Top-level settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    pub broadcast: BroadcastSettings,
    pub metadata: MetadataSettings,
    pub remote: RemoteSettings,
    pub logging: LoggingSettings,
}

/// Cross-tab broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastSettings {
    pub channel_name: String,
    /// When false the origin is created without a channel registry and every
    /// tab uses the shared-storage fallback.
    pub prefer_broadcast_channel: bool,
    /// Maximum size in bytes of one shared-storage entry. `None` = unlimited.
    pub storage_quota_bytes: Option<usize>,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            prefer_broadcast_channel: true,
            storage_quota_bytes: None,
        }
    }
}

/// Metadata enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/metadata".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteSettings {
    pub database_file: String,
    /// Whether the store exposes the atomic open-count increment.
    pub atomic_increment: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            database_file: "bookmarks.db".to_string(),
            atomic_increment: true,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// `tracing-subscriber` env-filter directive used when
    /// `SMART_BOOKMARKS_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
