//! Test doubles shared by the sync integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Barrier;

use smart_bookmarks::managers::sync_manager::BookmarkSync;
use smart_bookmarks::services::broadcaster::TabBroadcaster;
use smart_bookmarks::services::metadata_client::MetadataFetcher;
use smart_bookmarks::services::origin::Origin;
use smart_bookmarks::services::remote_store::{ChangeSubscription, RemoteStore, SqliteRemoteStore};
use smart_bookmarks::types::bookmark::{BookmarkRecord, NewBookmark};
use smart_bookmarks::types::errors::{MetadataError, RemoteError};
use smart_bookmarks::types::metadata::PageMetadata;
use smart_bookmarks::types::settings::DEFAULT_CHANNEL_NAME;

/// Metadata endpoint that is always unreachable.
pub struct UnreachableMetadata;

#[async_trait]
impl MetadataFetcher for UnreachableMetadata {
    async fn fetch(&self, _url: &str) -> Result<PageMetadata, MetadataError> {
        Err(MetadataError::NetworkError("connection refused".to_string()))
    }
}

/// Metadata endpoint that answers every URL with the same metadata.
pub struct StaticMetadata(pub PageMetadata);

#[async_trait]
impl MetadataFetcher for StaticMetadata {
    async fn fetch(&self, _url: &str) -> Result<PageMetadata, MetadataError> {
        Ok(self.0.clone())
    }
}

/// SQLite store with switchable write failures and an optional barrier that
/// holds open-count reads until every racing reader has read.
pub struct FlakyStore {
    pub inner: SqliteRemoteStore,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_select: AtomicBool,
    pub selects: AtomicUsize,
    pub read_barrier: Option<Barrier>,
}

impl FlakyStore {
    pub fn new(atomic_increment: bool) -> Self {
        Self {
            inner: SqliteRemoteStore::open_in_memory(atomic_increment).expect("in-memory store"),
            fail_insert: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_select: AtomicBool::new(false),
            selects: AtomicUsize::new(0),
            read_barrier: None,
        }
    }

    pub fn with_read_barrier(mut self, readers: usize) -> Self {
        self.read_barrier = Some(Barrier::new(readers));
        self
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), RemoteError> {
        if flag.load(Ordering::SeqCst) {
            Err(RemoteError::DatabaseError(format!("{} rejected", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn insert(&self, user_id: &str, new: NewBookmark) -> Result<BookmarkRecord, RemoteError> {
        Self::check(&self.fail_insert, "insert")?;
        self.inner.insert(user_id, new).await
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        title: &str,
        url: &str,
    ) -> Result<Option<BookmarkRecord>, RemoteError> {
        Self::check(&self.fail_update, "update")?;
        self.inner.update(user_id, id, title, url).await
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), RemoteError> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(user_id, id).await
    }

    async fn select_all(&self, user_id: &str) -> Result<Vec<BookmarkRecord>, RemoteError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_select, "select")?;
        self.inner.select_all(user_id).await
    }

    async fn increment_open_count(&self, user_id: &str, id: &str, opened_at: i64) -> Result<(), RemoteError> {
        self.inner.increment_open_count(user_id, id, opened_at).await
    }

    async fn fetch_open_count(&self, user_id: &str, id: &str) -> Result<Option<u32>, RemoteError> {
        let count = self.inner.fetch_open_count(user_id, id).await?;
        if let Some(barrier) = &self.read_barrier {
            barrier.wait().await;
        }
        Ok(count)
    }

    async fn set_open_stats(
        &self,
        user_id: &str,
        id: &str,
        open_count: u32,
        opened_at: i64,
    ) -> Result<(), RemoteError> {
        self.inner.set_open_stats(user_id, id, open_count, opened_at).await
    }

    fn subscribe_changes(&self, user_id: &str) -> ChangeSubscription {
        self.inner.subscribe_changes(user_id)
    }
}

/// Builds an unstarted tab on `origin`.
pub fn open_tab(
    origin: &Arc<Origin>,
    remote: Arc<dyn RemoteStore>,
    metadata: Arc<dyn MetadataFetcher>,
) -> BookmarkSync {
    let broadcaster = TabBroadcaster::new(origin.open_context(), DEFAULT_CHANNEL_NAME);
    BookmarkSync::new(remote, metadata, broadcaster)
}
