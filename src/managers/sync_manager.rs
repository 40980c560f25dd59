//! Bookmark sync component for one tab.
//!
//! Drives the local [`BookmarkStore`] from three directions:
//! user mutations (add, update, delete, track-open) that call the remote
//! store and broadcast the confirmed result, broadcast events from other
//! tabs, and change notifications from the remote store, each of which
//! triggers an authoritative refetch.
//!
//! All inbound work for a tab goes through `&mut self`, so a host runs one
//! component per task and inbound events apply in the order they are
//! processed.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::managers::bookmark_store::{BookmarkStore, BookmarkStoreTrait, Reconcile};
use crate::services::broadcaster::{BroadcastListener, TabBroadcaster};
use crate::services::metadata_client::MetadataFetcher;
use crate::services::remote_store::{ChangeSubscription, RemoteStore};
use crate::types::bookmark::{BookmarkRecord, NewBookmark};
use crate::types::broadcast::{BroadcastEvent, ChangeNotification};
use crate::types::errors::{RemoteError, SyncError};
use crate::types::metadata::PageMetadata;
use crate::types::now_millis;
use crate::types::session::Session;

/// Consumes the result of a best-effort side call. Failures are logged and
/// never reach the caller.
fn discard_logged<T, E: Display>(what: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "{} failed, continuing without it", what);
            None
        }
    }
}

/// Checks that title and url are present and that url is absolute.
///
/// Returns both values trimmed. `invalid_url` builds the error for a url that
/// does not parse, which differs between add and update.
fn validate(
    title: &str,
    url: &str,
    invalid_url: fn(String) -> SyncError,
) -> Result<(String, String), SyncError> {
    let title = title.trim();
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return Err(SyncError::MissingFields);
    }
    if Url::parse(url).is_err() {
        return Err(invalid_url(url.to_string()));
    }
    Ok((title.to_string(), url.to_string()))
}

/// Builds the insert payload; non-empty metadata title wins over the caller's.
fn enrich(title: String, url: String, metadata: Option<PageMetadata>) -> NewBookmark {
    match metadata {
        Some(meta) => NewBookmark {
            title: if meta.title.trim().is_empty() {
                title
            } else {
                meta.title
            },
            url,
            description: meta.description,
            image: meta.image,
        },
        None => NewBookmark {
            title,
            url,
            description: String::new(),
            image: String::new(),
        },
    }
}

enum Inbound {
    Broadcast(Option<BroadcastEvent>),
    Change(Option<ChangeNotification>),
}

/// Keeps one tab's bookmark list in step with the remote store and other tabs.
pub struct BookmarkSync {
    store: BookmarkStore,
    remote: Arc<dyn RemoteStore>,
    metadata: Arc<dyn MetadataFetcher>,
    broadcaster: TabBroadcaster,
    session: Option<Session>,
    listener: Option<BroadcastListener>,
    changes: Option<ChangeSubscription>,
}

impl BookmarkSync {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        metadata: Arc<dyn MetadataFetcher>,
        broadcaster: TabBroadcaster,
    ) -> Self {
        Self {
            store: BookmarkStore::new(),
            remote,
            metadata,
            broadcaster,
            session: None,
            listener: None,
            changes: None,
        }
    }

    pub fn store(&self) -> &BookmarkStore {
        &self.store
    }

    pub fn bookmarks(&self) -> &[BookmarkRecord] {
        self.store.bookmarks()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn broadcaster(&self) -> &TabBroadcaster {
        &self.broadcaster
    }

    pub fn error(&self) -> Option<&str> {
        self.store.error()
    }

    pub fn clear_error(&mut self) {
        self.store.set_error(None);
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some() || self.changes.is_some()
    }

    fn user_id(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.user_id.clone())
    }

    fn fail<T>(&mut self, error: SyncError) -> Result<T, SyncError> {
        warn!(error = ?error, "bookmark operation failed");
        self.store.set_error(Some(error.to_string()));
        Err(error)
    }

    /// Binds the session, loads the collection and opens both subscriptions.
    ///
    /// With no session the component stays signed out and only clears `loading`.
    pub async fn start(&mut self, session: Option<Session>) {
        self.store.set_loading(true);

        let Some(session) = session else {
            debug!("no session, bookmark sync stays idle");
            self.store.set_loading(false);
            return;
        };

        info!(user_id = %session.user_id, tab = self.broadcaster.context().id(), "starting bookmark sync");
        self.changes = Some(self.remote.subscribe_changes(&session.user_id));
        self.session = Some(session);
        self.refetch().await;
        self.listener = Some(self.broadcaster.listen());

        self.store.set_loading(false);
    }

    /// Closes the broadcast listener and the change subscription.
    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.close();
        }
        self.changes = None;
        debug!(tab = self.broadcaster.context().id(), "bookmark sync closed");
    }

    /// Replaces the local collection with the remote snapshot for the current user.
    ///
    /// Returns false when signed out or when the read failed; local state is
    /// kept as is in both cases.
    pub async fn refetch(&mut self) -> bool {
        let Some(user_id) = self.user_id() else {
            return false;
        };
        match self.remote.select_all(&user_id).await {
            Ok(snapshot) => {
                debug!(count = snapshot.len(), "refetched bookmarks");
                self.store.replace_all(snapshot);
                true
            }
            Err(e) => {
                warn!(error = %e, "bookmark refetch failed");
                false
            }
        }
    }

    /// Saves a new bookmark after a best-effort metadata lookup.
    ///
    /// Local state changes only once the remote insert succeeds.
    pub async fn add(&mut self, title: &str, url: &str) -> Result<BookmarkRecord, SyncError> {
        let (title, url) = match validate(title, url, SyncError::InvalidUrl) {
            Ok(fields) => fields,
            Err(e) => return self.fail(e),
        };
        let user_id = self.user_id().ok_or(SyncError::NotAuthenticated)?;

        self.store.set_submitting(true);
        self.store.set_error(None);

        let metadata = discard_logged("metadata fetch", self.metadata.fetch(&url).await);
        let result = self.remote.insert(&user_id, enrich(title, url, metadata)).await;
        self.store.set_submitting(false);

        match result {
            Ok(record) => {
                self.store.apply_added(record.clone());
                self.broadcaster.send(&BroadcastEvent::Added {
                    item: record.clone(),
                });
                Ok(record)
            }
            Err(e) => self.fail(SyncError::AddFailed(e.to_string())),
        }
    }

    /// Removes a bookmark optimistically, then deletes it remotely.
    ///
    /// On failure a `refetch` is broadcast instead of reinserting the record.
    pub async fn delete(&mut self, id: &str) -> Result<(), SyncError> {
        let user_id = self.user_id().ok_or(SyncError::NotAuthenticated)?;
        self.store.apply_deleted(id);

        let result = self.remote.delete(&user_id, id).await;
        match result {
            Ok(()) => {
                self.broadcaster.send(&BroadcastEvent::Deleted { id: id.to_string() });
                Ok(())
            }
            Err(e) => {
                self.broadcaster.send(&BroadcastEvent::Refetch);
                if !self.broadcaster.echoes_to_self() {
                    self.refetch().await;
                }
                self.fail(SyncError::DeleteFailed(e.to_string()))
            }
        }
    }

    /// Changes title and url remotely, then applies the confirmed record.
    ///
    /// Returns `Ok(None)` when the remote store no longer has the record.
    pub async fn update(
        &mut self,
        id: &str,
        title: &str,
        url: &str,
    ) -> Result<Option<BookmarkRecord>, SyncError> {
        let (title, url) = match validate(title, url, SyncError::InvalidUpdateUrl) {
            Ok(fields) => fields,
            Err(e) => return self.fail(e),
        };
        let user_id = self.user_id().ok_or(SyncError::NotAuthenticated)?;
        self.store.set_error(None);

        let result = self.remote.update(&user_id, id, &title, &url).await;
        match result {
            Ok(Some(record)) => {
                self.store.apply_updated(record.clone());
                self.broadcaster.send(&BroadcastEvent::Updated {
                    item: record.clone(),
                });
                Ok(Some(record))
            }
            Ok(None) => {
                debug!(id, "update matched no remote bookmark");
                Ok(None)
            }
            Err(e) => {
                self.broadcaster.send(&BroadcastEvent::Refetch);
                self.fail(SyncError::UpdateFailed(e.to_string()))
            }
        }
    }

    /// Records one open of `id`. Never fails from the caller's point of view.
    ///
    /// The new count is applied and broadcast before the remote write, which
    /// is skipped when signed out. The read-then-write fallback can lose
    /// increments under concurrent opens.
    pub async fn track_open(&mut self, id: &str) {
        let opened_at = now_millis();
        let open_count = self.store.record_open(id, opened_at);
        self.broadcaster.send(&BroadcastEvent::Tracked {
            id: id.to_string(),
            open_count,
            last_opened_at: opened_at,
        });

        let Some(user_id) = self.user_id() else {
            debug!(id, "signed out, open not persisted");
            return;
        };
        discard_logged("open tracking", self.persist_open(&user_id, id, opened_at).await);
    }

    async fn persist_open(&self, user_id: &str, id: &str, opened_at: i64) -> Result<(), RemoteError> {
        match self.remote.increment_open_count(user_id, id, opened_at).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(error = %e, "atomic increment unavailable, using read-then-write");
                let current = self.remote.fetch_open_count(user_id, id).await?.unwrap_or(0);
                self.remote
                    .set_open_stats(user_id, id, current.saturating_add(1), opened_at)
                    .await
            }
        }
    }

    /// Applies one broadcast event, refetching when it asks for it.
    pub async fn handle_event(&mut self, event: BroadcastEvent) -> Reconcile {
        let kind = event.kind();
        let outcome = self.store.apply(event);
        debug!(kind, ?outcome, "applied broadcast event");
        if outcome == Reconcile::RefetchRequired {
            self.refetch().await;
        }
        outcome
    }

    /// Waits for the next broadcast event or change notification and applies it.
    ///
    /// Returns false once both sources are closed.
    pub async fn process_next(&mut self) -> bool {
        let inbound = match (self.listener.as_mut(), self.changes.as_mut()) {
            (Some(listener), Some(changes)) => tokio::select! {
                event = listener.recv() => Inbound::Broadcast(event),
                change = changes.recv() => Inbound::Change(change),
            },
            (Some(listener), None) => Inbound::Broadcast(listener.recv().await),
            (None, Some(changes)) => Inbound::Change(changes.recv().await),
            (None, None) => return false,
        };

        match inbound {
            Inbound::Broadcast(Some(event)) => {
                self.handle_event(event).await;
            }
            Inbound::Broadcast(None) => self.listener = None,
            Inbound::Change(Some(change)) => {
                debug!(kind = ?change.kind, "change notification");
                self.refetch().await;
            }
            Inbound::Change(None) => self.changes = None,
        }
        self.is_listening()
    }

    /// Applies everything already queued without waiting. Returns how many
    /// broadcast events and change notifications were consumed.
    ///
    /// Queued broadcast events are applied first; queued change notifications
    /// are then coalesced into one refetch so the snapshot lands last.
    pub async fn drain_pending(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let mut events = 0;
            while let Some(event) = self.listener.as_mut().and_then(|l| l.try_recv()) {
                self.handle_event(event).await;
                events += 1;
            }
            processed += events;

            let mut changes = 0;
            while self.changes.as_mut().and_then(|c| c.try_recv()).is_some() {
                changes += 1;
            }
            if changes > 0 {
                debug!(changes, "coalescing change notifications into one refetch");
                self.refetch().await;
                processed += changes;
            }

            if events == 0 && changes == 0 {
                return processed;
            }
        }
    }
}
