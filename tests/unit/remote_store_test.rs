//! Unit tests for the SQLite-backed remote store.

use smart_bookmarks::services::remote_store::{RemoteStore, SqliteRemoteStore};
use smart_bookmarks::types::bookmark::NewBookmark;
use smart_bookmarks::types::broadcast::ChangeKind;
use smart_bookmarks::types::errors::RemoteError;

fn new_bookmark(title: &str) -> NewBookmark {
    NewBookmark {
        title: title.to_string(),
        url: format!("https://{}.example.com", title.to_lowercase()),
        description: format!("About {}", title),
        image: String::new(),
    }
}

fn store() -> SqliteRemoteStore {
    SqliteRemoteStore::open_in_memory(true).expect("in-memory store")
}

#[tokio::test]
async fn test_insert_assigns_id_and_defaults() {
    let store = store();

    let record = store.insert("u1", new_bookmark("Alpha")).await.unwrap();

    assert!(!record.id.is_empty());
    assert!(record.created_at > 0);
    assert_eq!(record.title, "Alpha");
    assert_eq!(record.description, "About Alpha");
    assert_eq!(record.open_count, 0);
    assert_eq!(record.last_opened_at, None);
}

#[tokio::test]
async fn test_select_all_newest_first_and_scoped_by_user() {
    let store = store();
    store.insert("u1", new_bookmark("First")).await.unwrap();
    store.insert("u2", new_bookmark("Foreign")).await.unwrap();
    store.insert("u1", new_bookmark("Second")).await.unwrap();
    store.insert("u1", new_bookmark("Third")).await.unwrap();

    let titles: Vec<String> = store
        .select_all("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();

    assert_eq!(titles, vec!["Third", "Second", "First"]);
}

#[tokio::test]
async fn test_update_keeps_identity() {
    let store = store();
    let original = store.insert("u1", new_bookmark("Alpha")).await.unwrap();

    let updated = store
        .update("u1", &original.id, "Beta", "https://beta.example.com")
        .await
        .unwrap()
        .expect("record exists");

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.title, "Beta");
    assert_eq!(updated.url, "https://beta.example.com");
    assert_eq!(updated.description, original.description);
}

#[tokio::test]
async fn test_update_unknown_returns_none() {
    let store = store();
    assert_eq!(store.update("u1", "missing", "T", "https://t").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_removes_and_tolerates_unknown() {
    let store = store();
    let record = store.insert("u1", new_bookmark("Alpha")).await.unwrap();

    store.delete("u1", &record.id).await.unwrap();
    store.delete("u1", &record.id).await.unwrap();

    assert!(store.select_all("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_increment_open_count() {
    let store = store();
    let record = store.insert("u1", new_bookmark("Alpha")).await.unwrap();

    store.increment_open_count("u1", &record.id, 100).await.unwrap();
    store.increment_open_count("u1", &record.id, 200).await.unwrap();

    let stored = &store.select_all("u1").await.unwrap()[0];
    assert_eq!(stored.open_count, 2);
    assert_eq!(stored.last_opened_at, Some(200));
}

#[tokio::test]
async fn test_increment_unsupported_or_missing() {
    let plain = SqliteRemoteStore::open_in_memory(false).unwrap();
    let record = plain.insert("u1", new_bookmark("Alpha")).await.unwrap();
    assert!(matches!(
        plain.increment_open_count("u1", &record.id, 1).await,
        Err(RemoteError::Unsupported(_))
    ));

    let atomic = store();
    assert_eq!(
        atomic.increment_open_count("u1", "ghost", 1).await,
        Err(RemoteError::NotFound("ghost".to_string()))
    );
}

#[tokio::test]
async fn test_fetch_and_set_open_stats() {
    let store = store();
    let record = store.insert("u1", new_bookmark("Alpha")).await.unwrap();

    assert_eq!(store.fetch_open_count("u1", &record.id).await.unwrap(), Some(0));
    store.set_open_stats("u1", &record.id, 9, 500).await.unwrap();
    assert_eq!(store.fetch_open_count("u1", &record.id).await.unwrap(), Some(9));

    let stored = &store.select_all("u1").await.unwrap()[0];
    assert_eq!(stored.last_opened_at, Some(500));

    assert_eq!(store.fetch_open_count("u1", "ghost").await.unwrap(), None);
    assert!(matches!(
        store.set_open_stats("u1", "ghost", 1, 1).await,
        Err(RemoteError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_writes_ignore_records_of_other_users() {
    let store = store();
    let record = store.insert("alice", new_bookmark("Alpha")).await.unwrap();
    let mut alice = store.subscribe_changes("alice");
    let mut mallory = store.subscribe_changes("mallory");

    let renamed = store
        .update("mallory", &record.id, "Pwned", "https://pwned.example.com")
        .await
        .unwrap();
    assert_eq!(renamed, None);
    store.delete("mallory", &record.id).await.unwrap();
    assert_eq!(
        store.increment_open_count("mallory", &record.id, 1).await,
        Err(RemoteError::NotFound(record.id.clone()))
    );
    assert_eq!(store.fetch_open_count("mallory", &record.id).await.unwrap(), None);
    assert!(matches!(
        store.set_open_stats("mallory", &record.id, 50, 1).await,
        Err(RemoteError::NotFound(_))
    ));

    let remaining = store.select_all("alice").await.unwrap();
    assert_eq!(remaining, vec![record]);
    assert!(alice.try_recv().is_none());
    assert!(mallory.try_recv().is_none());
}

#[tokio::test]
async fn test_change_notifications_follow_writes_for_owner_only() {
    let store = store();
    let mut mine = store.subscribe_changes("u1");
    let mut theirs = store.subscribe_changes("u2");

    let record = store.insert("u1", new_bookmark("Alpha")).await.unwrap();
    store
        .update("u1", &record.id, "Alpha 2", "https://alpha.example.com")
        .await
        .unwrap();
    store.increment_open_count("u1", &record.id, 1).await.unwrap();
    store.delete("u1", &record.id).await.unwrap();

    let kinds: Vec<ChangeKind> = std::iter::from_fn(|| mine.try_recv()).map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::Insert,
            ChangeKind::Update,
            ChangeKind::Update,
            ChangeKind::Delete
        ]
    );
    assert!(theirs.try_recv().is_none());
}

#[tokio::test]
async fn test_no_notification_for_no_op_writes() {
    let store = store();
    let mut changes = store.subscribe_changes("u1");

    store.delete("u1", "missing").await.unwrap();
    store.update("u1", "missing", "T", "https://t").await.unwrap();

    assert!(changes.try_recv().is_none());
}

#[tokio::test]
async fn test_subscription_recv_waits() {
    let store = store();
    let mut changes = store.subscribe_changes("u1");

    store.insert("u1", new_bookmark("Alpha")).await.unwrap();

    let notification = changes.recv().await.expect("store is alive");
    assert_eq!(notification.user_id, "u1");
    assert_eq!(notification.kind, ChangeKind::Insert);
}
