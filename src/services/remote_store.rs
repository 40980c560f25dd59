//! Remote bookmark store.
//!
//! [`RemoteStore`] is the seam between the sync layer and whatever backend
//! holds the authoritative bookmark collection: CRUD calls scoped by owner
//! and record id, a per-user ordered listing, the optional atomic open-count
//! increment and a user-scoped change subscription.
//!
//! [`SqliteRemoteStore`] implements it over `rusqlite`, publishing a change
//! notification after every successful write.

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::types::bookmark::{BookmarkRecord, NewBookmark};
use crate::types::broadcast::{ChangeKind, ChangeNotification};
use crate::types::errors::RemoteError;
use crate::types::now_millis;

const CHANGE_CAPACITY: usize = 256;

const SELECT_COLUMNS: &str =
    "id, title, url, description, image, created_at, open_count, last_opened_at";

/// Operations the sync layer needs from the remote store.
///
/// Every call is scoped by `user_id`; a record owned by another user behaves
/// as if it did not exist.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts a record for `user_id`; the store assigns `id` and `created_at`.
    async fn insert(&self, user_id: &str, new: NewBookmark) -> Result<BookmarkRecord, RemoteError>;
    /// Changes title and url. `Ok(None)` when the user has no record with that id.
    async fn update(
        &self,
        user_id: &str,
        id: &str,
        title: &str,
        url: &str,
    ) -> Result<Option<BookmarkRecord>, RemoteError>;
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), RemoteError>;
    /// All of the user's records, newest first.
    async fn select_all(&self, user_id: &str) -> Result<Vec<BookmarkRecord>, RemoteError>;
    /// Atomic `open_count + 1`. Stores without the primitive return `Unsupported`.
    async fn increment_open_count(&self, user_id: &str, id: &str, opened_at: i64) -> Result<(), RemoteError>;
    async fn fetch_open_count(&self, user_id: &str, id: &str) -> Result<Option<u32>, RemoteError>;
    async fn set_open_stats(
        &self,
        user_id: &str,
        id: &str,
        open_count: u32,
        opened_at: i64,
    ) -> Result<(), RemoteError>;
    fn subscribe_changes(&self, user_id: &str) -> ChangeSubscription;
}

/// Change notifications for one user's records.
pub struct ChangeSubscription {
    user_id: String,
    receiver: broadcast::Receiver<ChangeNotification>,
}

impl ChangeSubscription {
    pub fn new(user_id: impl Into<String>, receiver: broadcast::Receiver<ChangeNotification>) -> Self {
        Self {
            user_id: user_id.into(),
            receiver,
        }
    }

    /// Waits for the next notification for this user. `None` once the store is gone.
    ///
    /// A lagged receiver yields a synthetic update notification since the
    /// only reaction to any notification is a full refetch.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.receiver.recv().await {
                Ok(n) if n.user_id == self.user_id => return Some(n),
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => return Some(self.lagged()),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next queued notification for this user without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeNotification> {
        loop {
            match self.receiver.try_recv() {
                Ok(n) if n.user_id == self.user_id => return Some(n),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(_)) => return Some(self.lagged()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn lagged(&self) -> ChangeNotification {
        ChangeNotification {
            user_id: self.user_id.clone(),
            kind: ChangeKind::Update,
        }
    }
}

/// Remote store backed by a SQLite database.
pub struct SqliteRemoteStore {
    db: Mutex<Database>,
    changes: broadcast::Sender<ChangeNotification>,
    atomic_increment: bool,
}

impl SqliteRemoteStore {
    pub fn new(db: Database, atomic_increment: bool) -> Self {
        Self {
            db: Mutex::new(db),
            changes: broadcast::channel(CHANGE_CAPACITY).0,
            atomic_increment,
        }
    }

    pub fn open_in_memory(atomic_increment: bool) -> Result<Self, RemoteError> {
        let db = Database::open_in_memory().map_err(db_err)?;
        Ok(Self::new(db, atomic_increment))
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T, rusqlite::Error>) -> Result<T, RemoteError> {
        let db = self
            .db
            .lock()
            .map_err(|_| RemoteError::DatabaseError("database lock poisoned".to_string()))?;
        f(&db).map_err(db_err)
    }

    fn notify(&self, user_id: String, kind: ChangeKind) {
        debug!(user_id = %user_id, ?kind, "publishing change notification");
        let _ = self.changes.send(ChangeNotification { user_id, kind });
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<BookmarkRecord> {
        Ok(BookmarkRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            description: row.get(3)?,
            image: row.get(4)?,
            created_at: row.get(5)?,
            open_count: row.get(6)?,
            last_opened_at: row.get(7)?,
        })
    }

    fn select_one(db: &Database, user_id: &str, id: &str) -> rusqlite::Result<Option<BookmarkRecord>> {
        db.connection()
            .query_row(
                &format!("SELECT {} FROM bookmarks WHERE id = ?1 AND user_id = ?2", SELECT_COLUMNS),
                params![id, user_id],
                Self::row_to_record,
            )
            .optional()
    }
}

fn db_err(e: rusqlite::Error) -> RemoteError {
    RemoteError::DatabaseError(e.to_string())
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn insert(&self, user_id: &str, new: NewBookmark) -> Result<BookmarkRecord, RemoteError> {
        let record = BookmarkRecord {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            url: new.url,
            description: new.description,
            image: new.image,
            created_at: now_millis(),
            open_count: 0,
            last_opened_at: None,
        };
        self.with_db(|db| {
            db.connection().execute(
                "INSERT INTO bookmarks (id, user_id, title, url, description, image, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    user_id,
                    record.title,
                    record.url,
                    record.description,
                    record.image,
                    record.created_at
                ],
            )
        })?;
        self.notify(user_id.to_string(), ChangeKind::Insert);
        Ok(record)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        title: &str,
        url: &str,
    ) -> Result<Option<BookmarkRecord>, RemoteError> {
        let updated = self.with_db(|db| {
            let changed = db.connection().execute(
                "UPDATE bookmarks SET title = ?1, url = ?2 WHERE id = ?3 AND user_id = ?4",
                params![title, url, id, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            Self::select_one(db, user_id, id)
        })?;
        if updated.is_some() {
            self.notify(user_id.to_string(), ChangeKind::Update);
        }
        Ok(updated)
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), RemoteError> {
        let changed = self.with_db(|db| {
            db.connection().execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
        })?;
        if changed > 0 {
            self.notify(user_id.to_string(), ChangeKind::Delete);
        }
        Ok(())
    }

    async fn select_all(&self, user_id: &str) -> Result<Vec<BookmarkRecord>, RemoteError> {
        self.with_db(|db| {
            let mut stmt = db.connection().prepare(&format!(
                "SELECT {} FROM bookmarks WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
                SELECT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![user_id], Self::row_to_record)?;
            rows.collect()
        })
    }

    async fn increment_open_count(&self, user_id: &str, id: &str, opened_at: i64) -> Result<(), RemoteError> {
        if !self.atomic_increment {
            return Err(RemoteError::Unsupported("increment_open_count".to_string()));
        }
        let changed = self.with_db(|db| {
            db.connection().execute(
                "UPDATE bookmarks SET open_count = open_count + 1, last_opened_at = ?1 \
                 WHERE id = ?2 AND user_id = ?3",
                params![opened_at, id, user_id],
            )
        })?;
        if changed == 0 {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        self.notify(user_id.to_string(), ChangeKind::Update);
        Ok(())
    }

    async fn fetch_open_count(&self, user_id: &str, id: &str) -> Result<Option<u32>, RemoteError> {
        self.with_db(|db| {
            db.connection()
                .query_row(
                    "SELECT open_count FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                    |row| row.get(0),
                )
                .optional()
        })
    }

    async fn set_open_stats(
        &self,
        user_id: &str,
        id: &str,
        open_count: u32,
        opened_at: i64,
    ) -> Result<(), RemoteError> {
        let changed = self.with_db(|db| {
            db.connection().execute(
                "UPDATE bookmarks SET open_count = ?1, last_opened_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![open_count, opened_at, id, user_id],
            )
        })?;
        if changed == 0 {
            warn!(id, user_id, "open stats written for unknown bookmark");
            return Err(RemoteError::NotFound(id.to_string()));
        }
        self.notify(user_id.to_string(), ChangeKind::Update);
        Ok(())
    }

    fn subscribe_changes(&self, user_id: &str) -> ChangeSubscription {
        ChangeSubscription::new(user_id, self.changes.subscribe())
    }
}
