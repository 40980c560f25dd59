// Smart Bookmarks services
// Collaborators of the sync layer: remote store, metadata client, same-origin
// messaging, the cross-tab broadcaster and settings.

pub mod broadcaster;
pub mod metadata_client;
pub mod origin;
pub mod remote_store;
pub mod settings_engine;
