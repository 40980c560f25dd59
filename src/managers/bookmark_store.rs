//! Local bookmark state for one tab.
//!
//! Holds the ordered collection of the signed-in user's bookmarks plus the
//! transient `loading`/`submitting`/`error` flags. Every transition is pure:
//! nothing here talks to the remote store or to other tabs.

use strsim::osa_distance;
use url::Url;

use crate::types::bookmark::BookmarkRecord;
use crate::types::broadcast::BroadcastEvent;

/// Outcome of applying a [`BroadcastEvent`] to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// The collection changed.
    Applied,
    /// The event did not match local state and was dropped.
    Ignored,
    /// The caller must reload the collection from the remote store.
    RefetchRequired,
}

/// State transitions over the local collection.
pub trait BookmarkStoreTrait {
    fn apply_added(&mut self, record: BookmarkRecord) -> bool;
    fn apply_updated(&mut self, record: BookmarkRecord) -> bool;
    fn apply_deleted(&mut self, id: &str) -> bool;
    fn apply_tracked(&mut self, id: &str, open_count: u32, last_opened_at: i64) -> bool;
    fn apply(&mut self, event: BroadcastEvent) -> Reconcile;
    fn replace_all(&mut self, snapshot: Vec<BookmarkRecord>);
}

/// In-memory, most-recent-first bookmark collection.
#[derive(Debug, Default)]
pub struct BookmarkStore {
    bookmarks: Vec<BookmarkRecord>,
    loading: bool,
    submitting: bool,
    error: Option<String>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.bookmarks.iter().position(|b| b.id == id)
    }

    pub fn bookmarks(&self) -> &[BookmarkRecord] {
        &self.bookmarks
    }

    pub fn get(&self, id: &str) -> Option<&BookmarkRecord> {
        self.bookmarks.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn set_submitting(&mut self, submitting: bool) {
        self.submitting = submitting;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Optimistically records one more open of `id` at `opened_at`.
    ///
    /// Returns the new count. When the record is not held locally the count
    /// is computed from zero and nothing changes.
    pub fn record_open(&mut self, id: &str, opened_at: i64) -> u32 {
        let open_count = self
            .get(id)
            .map(|b| b.open_count.saturating_add(1))
            .unwrap_or(1);
        self.apply_tracked(id, open_count, opened_at);
        open_count
    }

    /// Typo-tolerant search over title, description and url.
    ///
    /// A record matches when some stretch of one field is within
    /// [`SEARCH_THRESHOLD`] edits per query character of the query. Matches
    /// are ranked best first; equal scores keep collection order. A blank
    /// query returns the whole collection.
    pub fn search(&self, query: &str) -> Vec<&BookmarkRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.bookmarks.iter().collect();
        }
        let mut ranked: Vec<(f64, &BookmarkRecord)> = self
            .bookmarks
            .iter()
            .filter_map(|b| {
                [&b.title, &b.description, &b.url]
                    .into_iter()
                    .filter_map(|field| match_score(field, &needle))
                    .min_by(f64::total_cmp)
                    .map(|score| (score, b))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.into_iter().map(|(_, b)| b).collect()
    }
}

/// Highest edits-per-character ratio a search hit may have.
pub const SEARCH_THRESHOLD: f64 = 0.3;

/// Best edit ratio of `needle` against any window of `field`, if within threshold.
///
/// Windows are one character shorter to one longer than the needle so a
/// dropped or doubled letter still lines up.
fn match_score(field: &str, needle: &str) -> Option<f64> {
    let text: Vec<char> = field.to_lowercase().chars().collect();
    let n = needle.chars().count();
    let mut best = usize::MAX;
    for start in 0..text.len() {
        for len in n.saturating_sub(1).max(1)..=n + 1 {
            let end = (start + len).min(text.len());
            let window: String = text[start..end].iter().collect();
            best = best.min(osa_distance(&window, needle));
            if best == 0 {
                return Some(0.0);
            }
        }
    }
    let score = best as f64 / n as f64;
    (score <= SEARCH_THRESHOLD).then_some(score)
}

impl BookmarkStoreTrait for BookmarkStore {
    /// Prepends `record` unless its id is already present.
    fn apply_added(&mut self, record: BookmarkRecord) -> bool {
        if self.position(&record.id).is_some() {
            return false;
        }
        self.bookmarks.insert(0, record);
        true
    }

    /// Replaces the record with the same id, keeping its position.
    fn apply_updated(&mut self, record: BookmarkRecord) -> bool {
        match self.position(&record.id) {
            Some(idx) => {
                self.bookmarks[idx] = record;
                true
            }
            None => false,
        }
    }

    fn apply_deleted(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.bookmarks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Overwrites only the analytics fields of the matching record.
    fn apply_tracked(&mut self, id: &str, open_count: u32, last_opened_at: i64) -> bool {
        match self.position(id) {
            Some(idx) => {
                let record = &mut self.bookmarks[idx];
                record.open_count = open_count;
                record.last_opened_at = Some(last_opened_at);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, event: BroadcastEvent) -> Reconcile {
        let changed = match event {
            BroadcastEvent::Added { item } => self.apply_added(item),
            BroadcastEvent::Updated { item } => self.apply_updated(item),
            BroadcastEvent::Deleted { id } => self.apply_deleted(&id),
            BroadcastEvent::Tracked {
                id,
                open_count,
                last_opened_at,
            } => self.apply_tracked(&id, open_count, last_opened_at),
            BroadcastEvent::Refetch => return Reconcile::RefetchRequired,
        };
        if changed {
            Reconcile::Applied
        } else {
            Reconcile::Ignored
        }
    }

    /// Installs an authoritative snapshot, discarding all local state.
    fn replace_all(&mut self, snapshot: Vec<BookmarkRecord>) {
        self.bookmarks = snapshot;
    }
}

/// Returns the host name of `url`, or an empty string when it does not parse.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
