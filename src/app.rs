//! App core for Smart Bookmarks.
//!
//! Owns the collaborators shared by every tab of one origin (settings,
//! remote store, metadata client, same-origin messaging) and the open tabs,
//! each running its own [`BookmarkSync`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::database::Database;
use crate::managers::sync_manager::BookmarkSync;
use crate::services::broadcaster::TabBroadcaster;
use crate::services::metadata_client::{HttpMetadataClient, MetadataFetcher};
use crate::services::origin::Origin;
use crate::services::remote_store::{RemoteStore, SqliteRemoteStore};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::session::Session;
use crate::types::settings::SyncSettings;

/// Central struct holding the shared collaborators and the open tabs.
pub struct App {
    /// Settings the running components were built with.
    pub settings: SyncSettings,
    /// Persisted settings; changes apply on the next start.
    pub settings_engine: SettingsEngine,
    pub origin: Arc<Origin>,
    pub remote: Arc<dyn RemoteStore>,
    pub metadata: Arc<dyn MetadataFetcher>,
    tabs: HashMap<String, BookmarkSync>,
}

impl App {
    /// Creates an App backed by a SQLite store at `db_path` and the HTTP
    /// metadata client, configured from the engine's current settings.
    pub fn new(db_path: &str, settings_engine: SettingsEngine) -> Result<Self, Box<dyn std::error::Error>> {
        let settings = settings_engine.get_settings().clone();
        let db = Database::open(db_path)?;
        let remote = Arc::new(SqliteRemoteStore::new(db, settings.remote.atomic_increment));
        let metadata = Arc::new(HttpMetadataClient::new(
            settings.metadata.endpoint.clone(),
            Duration::from_secs(settings.metadata.timeout_secs),
        )?);
        info!(db_path, "opened bookmark store");
        Ok(Self::with_collaborators(settings_engine, remote, metadata))
    }

    /// Creates an App around caller-supplied collaborators.
    pub fn with_collaborators(
        settings_engine: SettingsEngine,
        remote: Arc<dyn RemoteStore>,
        metadata: Arc<dyn MetadataFetcher>,
    ) -> Self {
        let settings = settings_engine.get_settings().clone();
        let origin = Origin::build(
            settings.broadcast.prefer_broadcast_channel,
            settings.broadcast.storage_quota_bytes,
        );
        Self {
            settings,
            settings_engine,
            origin,
            remote,
            metadata,
            tabs: HashMap::new(),
        }
    }

    /// Opens a tab, starts its sync component and returns the tab id.
    pub async fn open_tab(&mut self, session: Option<Session>) -> String {
        let context = self.origin.open_context();
        let tab_id = context.id().to_string();
        let broadcaster = TabBroadcaster::new(context, self.settings.broadcast.channel_name.clone());
        let mut sync = BookmarkSync::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.metadata),
            broadcaster,
        );
        sync.start(session).await;
        self.tabs.insert(tab_id.clone(), sync);
        tab_id
    }

    /// Tears down the tab's subscriptions and forgets it.
    pub fn close_tab(&mut self, tab_id: &str) -> bool {
        match self.tabs.remove(tab_id) {
            Some(mut sync) => {
                sync.close();
                true
            }
            None => false,
        }
    }

    pub fn tab(&self, tab_id: &str) -> Option<&BookmarkSync> {
        self.tabs.get(tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: &str) -> Option<&mut BookmarkSync> {
        self.tabs.get_mut(tab_id)
    }

    /// Ids of the open tabs, sorted for stable output.
    pub fn tab_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tabs.keys().cloned().collect();
        ids.sort();
        ids
    }
}
