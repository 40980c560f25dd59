use std::fmt;

// === SyncError ===

/// Errors surfaced to the user by bookmark mutations.
///
/// The `Display` text is the user-facing message stored in the sync
/// component's `error` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Title or URL was empty after trimming.
    MissingFields,
    /// The URL passed to `add` does not parse as an absolute URL.
    InvalidUrl(String),
    /// The URL passed to `update` does not parse as an absolute URL.
    InvalidUpdateUrl(String),
    /// No session is bound to the sync component.
    NotAuthenticated,
    /// The remote insert was rejected.
    AddFailed(String),
    /// The remote update was rejected.
    UpdateFailed(String),
    /// The remote delete was rejected.
    DeleteFailed(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::MissingFields => write!(f, "Title and URL are required."),
            SyncError::InvalidUrl(_) => write!(f, "Enter valid URL (https://...)"),
            SyncError::InvalidUpdateUrl(_) => write!(f, "Invalid URL"),
            SyncError::NotAuthenticated => write!(f, "Not signed in."),
            SyncError::AddFailed(_) => write!(f, "Failed to add bookmark."),
            SyncError::UpdateFailed(_) => write!(f, "Failed to update bookmark."),
            SyncError::DeleteFailed(_) => write!(f, "Failed to delete bookmark."),
        }
    }
}

impl std::error::Error for SyncError {}

impl SyncError {
    /// Whether the error was raised before any remote call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SyncError::MissingFields
                | SyncError::InvalidUrl(_)
                | SyncError::InvalidUpdateUrl(_)
                | SyncError::NotAuthenticated
        )
    }
}

// === RemoteError ===

/// Errors reported by a remote bookmark store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The store rejected or failed to execute the request.
    DatabaseError(String),
    /// The store does not provide the requested primitive.
    Unsupported(String),
    /// The addressed record does not exist.
    NotFound(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::DatabaseError(msg) => write!(f, "Remote store error: {}", msg),
            RemoteError::Unsupported(what) => {
                write!(f, "Remote store does not support: {}", what)
            }
            RemoteError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
        }
    }
}

impl std::error::Error for RemoteError {}

// === MetadataError ===

/// Errors from the metadata endpoint. Never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The request could not be sent or the connection failed.
    NetworkError(String),
    /// The endpoint answered with a non-success status.
    BadStatus(u16),
    /// The response body was not valid metadata JSON.
    ParseError(String),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::NetworkError(msg) => write!(f, "Metadata network error: {}", msg),
            MetadataError::BadStatus(code) => {
                write!(f, "Metadata endpoint returned status {}", code)
            }
            MetadataError::ParseError(msg) => write!(f, "Metadata parse error: {}", msg),
        }
    }
}

impl std::error::Error for MetadataError {}

// === BroadcastError ===

/// Errors raised while posting to other tabs. Always swallowed by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The event could not be serialized.
    SerializationError(String),
    /// The shared storage area refused the write.
    QuotaExceeded { key: String, size: usize },
    /// The shared storage area is unavailable (e.g. private mode).
    StorageUnavailable,
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastError::SerializationError(msg) => {
                write!(f, "Broadcast serialization error: {}", msg)
            }
            BroadcastError::QuotaExceeded { key, size } => {
                write!(f, "Storage quota exceeded writing {} bytes to '{}'", size, key)
            }
            BroadcastError::StorageUnavailable => write!(f, "Shared storage unavailable"),
        }
    }
}

impl std::error::Error for BroadcastError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
