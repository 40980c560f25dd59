// Smart Bookmarks state managers
// Local per-tab bookmark state and the sync component driving it.

pub mod bookmark_store;
pub mod sync_manager;
