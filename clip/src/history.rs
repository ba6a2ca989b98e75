//! HistoryStore - bounded, deduplicated clipboard history
//!
//! Ordering is by a monotonic recency stamp owned by the store, so promotion
//! never depends on wall-clock resolution. Capacity is enforced by evicting
//! a single unlocked entry (lowest usage count, then oldest recency) after
//! every successful insert.
//!
//! Error policy: every public mutation converts `ClipError` into a logged
//! `false`. Eviction and event fan-out only run after the write they follow
//! has been confirmed by the repository.

use crate::config::Config;
use crate::database::Database;
use crate::events::{EventBus, HistoryObserver};
use crate::interface::{ClipError, HistoryEvent};
use crate::models::Entry;
use crate::repository::{MemoryRepository, Repository};
use crate::similarity::SimilarityMatcher;
use chrono::Utc;
use tracing::{debug, error, warn};

/// Default `HISTORY_MAX_SIZE`
pub const DEFAULT_CAPACITY: usize = 300;

pub struct HistoryStore {
    repo: Box<dyn Repository>,
    capacity: usize,
    /// Last recency stamp handed out
    clock: i64,
    events: EventBus,
    matcher: SimilarityMatcher,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("capacity", &self.capacity)
            .field("clock", &self.clock)
            .field("events", &self.events)
            .finish()
    }
}

fn report(op: &'static str, err: &ClipError) {
    match err {
        ClipError::Storage(_) => error!(op, error = %err, "history operation failed"),
        ClipError::Validation(_) | ClipError::NotFound(_) => {
            warn!(op, error = %err, "history operation rejected")
        }
    }
}

impl HistoryStore {
    /// Attach to a repository. The recency clock resumes after the highest
    /// stamp already stored.
    pub fn open(repo: Box<dyn Repository>, capacity: usize) -> Result<Self, ClipError> {
        let clock = repo.max_recency()?;
        let capacity = capacity.max(1);
        debug!(capacity, clock, "history store opened");
        Ok(Self {
            repo,
            capacity,
            clock,
            events: EventBus::new(),
            matcher: SimilarityMatcher::default(),
        })
    }

    /// Store over a SQLite database
    pub fn with_database(db: Database, capacity: usize) -> Result<Self, ClipError> {
        Self::open(Box::new(db), capacity)
    }

    /// Store over a fresh in-memory repository
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            repo: Box::new(MemoryRepository::new()),
            capacity: capacity.max(1),
            clock: 0,
            events: EventBus::new(),
            matcher: SimilarityMatcher::default(),
        }
    }

    /// Store over `repo` sized and tuned by the `[history]` config section
    pub fn from_config(repo: Box<dyn Repository>, config: &Config) -> Result<Self, ClipError> {
        let store = Self::open(repo, config.history.max_size)?
            .with_matcher(SimilarityMatcher::new(config.history.max_similarity_len));
        Ok(store)
    }

    pub fn with_matcher(mut self, matcher: SimilarityMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn matcher(&self) -> &SimilarityMatcher {
        &self.matcher
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn subscribe(&mut self, observer: Box<dyn HistoryObserver>) {
        self.events.add_boxed(observer);
    }

    /// Release the backing store
    pub fn close(self) {
        debug!(entries = self.len(), "history store closed");
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Record `entry` as the most recent value.
    ///
    /// A new text is inserted with a usage count of one. A text (or id) that
    /// is already stored is promoted instead: usage count bumped, recency
    /// refreshed. On success `entry` is overwritten with the stored row.
    pub fn prepend(&mut self, entry: &mut Entry) -> bool {
        match self.try_prepend(entry) {
            Ok(stored) => {
                *entry = stored;
                true
            }
            Err(e) => {
                report("prepend", &e);
                false
            }
        }
    }

    fn try_prepend(&mut self, entry: &Entry) -> Result<Entry, ClipError> {
        if entry.text.is_empty() {
            return Err(ClipError::Validation("cannot record empty text".into()));
        }

        let by_id = match entry.id {
            Some(id) => self.repo.find_by_id(id)?,
            None => None,
        };
        let existing = match by_id {
            Some(found) => Some(found),
            None => self.repo.find_by_text(&entry.text)?,
        };

        let recency = self.clock + 1;
        let now = Utc::now().timestamp();
        let mut displaced = None;

        let stored = match existing {
            Some(mut stored) => {
                if stored.text != entry.text {
                    displaced = self.text_holder(&entry.text, stored.id)?;
                    stored.text = entry.text.clone();
                }
                stored.usage_count = stored.usage_count.saturating_add(1);
                stored.recency = recency;
                stored.timestamp_unix = now;
                self.repo
                    .update_displacing(&stored, displaced.as_ref().and_then(|d| d.id))?;
                debug!(id = ?stored.id, usage = stored.usage_count, "promoted history entry");
                stored
            }
            None => {
                let mut fresh = Entry {
                    id: None,
                    usage_count: 1,
                    recency,
                    timestamp_unix: now,
                    ..entry.clone()
                };
                fresh.id = Some(self.repo.insert(&fresh)?);
                debug!(id = ?fresh.id, "inserted history entry");
                fresh
            }
        };
        self.clock = recency;

        if let Some(gone) = displaced {
            debug!(id = ?gone.id, "removed duplicate text holder");
            self.events.notify(HistoryEvent::Remove(gone));
        }
        self.events.notify(HistoryEvent::Add(stored.clone()));

        if let Err(e) = self.enforce_capacity() {
            report("evict", &e);
        }
        Ok(stored)
    }

    /// The entry other than `keep` currently holding `text`, which a write
    /// taking that text over must delete in the same unit. Locked holders are
    /// never displaced.
    fn text_holder(&self, text: &str, keep: Option<i64>) -> Result<Option<Entry>, ClipError> {
        let holder = match self.repo.find_by_text(text)? {
            Some(holder) if holder.id != keep => holder,
            _ => return Ok(None),
        };
        if holder.locked {
            return Err(ClipError::Validation(format!(
                "text is held by locked entry {}",
                holder.id.unwrap_or_default()
            )));
        }
        Ok(Some(holder))
    }

    fn enforce_capacity(&mut self) -> Result<(), ClipError> {
        let count = self.repo.count()?;
        if count <= self.capacity as u64 {
            return Ok(());
        }
        match self.repo.eviction_candidate()? {
            Some(victim) => {
                if let Some(id) = victim.id {
                    self.repo.delete(id)?;
                    debug!(id, usage = victim.usage_count, "evicted history entry");
                    self.events.notify(HistoryEvent::Remove(victim));
                }
            }
            None => warn!(count, capacity = self.capacity, "history over capacity but every entry is locked"),
        }
        Ok(())
    }

    /// Persist edits to text, lock, tag and mask of a stored entry.
    ///
    /// Another unlocked entry already holding the new text is removed in the
    /// same write.
    /// A tag held by a different entry is rejected.
    pub fn update(&mut self, entry: &mut Entry) -> bool {
        match self.try_update(entry) {
            Ok(stored) => {
                *entry = stored;
                true
            }
            Err(e) => {
                report("update", &e);
                false
            }
        }
    }

    fn try_update(&mut self, entry: &Entry) -> Result<Entry, ClipError> {
        let id = entry
            .id
            .ok_or_else(|| ClipError::Validation("entry has not been stored".into()))?;
        if entry.text.is_empty() {
            return Err(ClipError::Validation("cannot store empty text".into()));
        }
        let stored = self.repo.find_by_id(id)?.ok_or(ClipError::NotFound(id))?;

        if let Some(tag) = entry.tag {
            if let Some(holder) = self.repo.find_by_tag(tag)? {
                if holder.id != Some(id) {
                    return Err(ClipError::Validation(format!(
                        "tag '{}' is held by entry {}",
                        tag,
                        holder.id.unwrap_or_default()
                    )));
                }
            }
        }

        let displaced = if stored.text != entry.text {
            self.text_holder(&entry.text, Some(id))?
        } else {
            None
        };

        let updated = Entry {
            text: entry.text.clone(),
            locked: entry.locked,
            tag: entry.tag,
            masked: entry.masked,
            ..stored
        };
        self.repo
            .update_displacing(&updated, displaced.as_ref().and_then(|d| d.id))?;
        debug!(id, locked = updated.locked, tag = ?updated.tag, "updated history entry");

        if let Some(gone) = displaced {
            debug!(id = ?gone.id, "removed duplicate text holder");
            self.events.notify(HistoryEvent::Remove(gone));
        }
        self.events.notify(HistoryEvent::Update(updated.clone()));
        Ok(updated)
    }

    /// Delete a stored entry. Locked entries are refused.
    pub fn remove(&mut self, entry: &Entry) -> bool {
        match self.try_remove(entry) {
            Ok(()) => true,
            Err(e) => {
                report("remove", &e);
                false
            }
        }
    }

    fn try_remove(&mut self, entry: &Entry) -> Result<(), ClipError> {
        let id = entry
            .id
            .ok_or_else(|| ClipError::Validation("entry has not been stored".into()))?;
        // Trust the stored lock state, not the caller's copy
        let stored = self.repo.find_by_id(id)?.ok_or(ClipError::NotFound(id))?;
        if stored.locked {
            return Err(ClipError::Validation(format!("entry {} is locked", id)));
        }
        self.repo.delete(id)?;
        debug!(id, "removed history entry");
        self.events.notify(HistoryEvent::Remove(stored));
        Ok(())
    }

    /// Delete the most recent unlocked entry. False when there is none.
    pub fn remove_head(&mut self) -> bool {
        let head = match self.repo.newest_unlocked() {
            Ok(Some(head)) => head,
            Ok(None) => return false,
            Err(e) => {
                report("remove_head", &e.into());
                return false;
            }
        };
        self.remove(&head)
    }

    /// Delete every unlocked entry
    pub fn clear(&mut self) -> bool {
        match self.repo.delete_unlocked() {
            Ok(removed) => {
                debug!(removed, "cleared history");
                self.events.notify(HistoryEvent::Clear);
                true
            }
            Err(e) => {
                report("clear", &e.into());
                false
            }
        }
    }

    pub fn toggle_lock(&mut self, entry: &mut Entry) -> bool {
        let mut changed = entry.clone();
        changed.locked = !changed.locked;
        self.apply(entry, changed)
    }

    pub fn toggle_mask(&mut self, entry: &mut Entry) -> bool {
        let mut changed = entry.clone();
        changed.masked = !changed.masked;
        self.apply(entry, changed)
    }

    fn apply(&mut self, entry: &mut Entry, mut changed: Entry) -> bool {
        if self.update(&mut changed) {
            *entry = changed;
            true
        } else {
            false
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Snapshot of every entry, most recent first
    pub fn get_list(&self) -> Vec<Entry> {
        self.recent_or_all(None)
    }

    /// The `limit` most recent entries
    pub fn recent(&self, limit: usize) -> Vec<Entry> {
        self.recent_or_all(Some(limit))
    }

    fn recent_or_all(&self, limit: Option<usize>) -> Vec<Entry> {
        self.repo.fetch_ordered(limit).unwrap_or_else(|e| {
            report("list", &e.into());
            Vec::new()
        })
    }

    pub fn get_head(&self) -> Option<Entry> {
        self.recent(1).into_iter().next()
    }

    pub fn find(&self, id: i64) -> Option<Entry> {
        self.repo.find_by_id(id).unwrap_or_else(|e| {
            report("find", &e.into());
            None
        })
    }

    pub fn find_by_tag(&self, tag: char) -> Option<Entry> {
        self.repo.find_by_tag(tag).unwrap_or_else(|e| {
            report("find_by_tag", &e.into());
            None
        })
    }

    /// First near-duplicate of `entry` among the `scan_limit` most recent
    pub fn get_similar(&self, entry: &Entry, scan_limit: usize) -> Option<Entry> {
        self.matcher.find_similar(self, entry, scan_limit)
    }

    /// Case-insensitive substring filter, most recent first.
    /// Masked entries are never matched on their hidden text.
    pub fn search(&self, query: &str) -> Vec<Entry> {
        let needle = query.to_lowercase();
        self.get_list()
            .into_iter()
            .filter(|entry| {
                needle.is_empty() || (!entry.masked && entry.text.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.repo.count().map(|c| c as usize).unwrap_or_else(|e| {
            report("count", &e.into());
            0
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseError, DatabaseResult};
    use crate::interface::EventKind;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn store_with(capacity: usize, texts: &[&str]) -> (HistoryStore, Vec<Entry>) {
        let mut store = HistoryStore::in_memory(capacity);
        let mut entries = Vec::new();
        for text in texts {
            let mut entry = Entry::new_text(*text);
            assert!(store.prepend(&mut entry));
            entries.push(entry);
        }
        (store, entries)
    }

    fn texts(store: &HistoryStore) -> Vec<String> {
        store.get_list().into_iter().map(|e| e.text).collect()
    }

    fn record_events(store: &mut HistoryStore) -> Rc<RefCell<Vec<EventKind>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        store
            .events_mut()
            .add_observer(move |event: &HistoryEvent| sink.borrow_mut().push(event.kind()));
        log
    }

    #[test]
    fn test_prepend_new_entry() {
        let mut store = HistoryStore::in_memory(10);
        let mut entry = Entry::new_text("first copy");
        assert!(store.prepend(&mut entry));
        assert!(entry.id.is_some());
        assert_eq!(entry.usage_count, 1);
        assert_eq!(store.get_head().unwrap(), entry);
    }

    #[test]
    fn test_prepend_rejects_empty_text() {
        let mut store = HistoryStore::in_memory(10);
        let mut entry = Entry::new_text("");
        assert!(!store.prepend(&mut entry));
        assert!(entry.is_new());
        assert!(store.is_empty());
    }

    #[test]
    fn test_prepend_duplicate_text_promotes() {
        let (mut store, entries) = store_with(10, &["alpha", "beta"]);
        let mut again = Entry::new_text("alpha");
        assert!(store.prepend(&mut again));

        assert_eq!(again.id, entries[0].id);
        assert_eq!(again.usage_count, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(texts(&store), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_capacity_evicts_one() {
        let (store, _) = store_with(3, &["one", "two", "three", "four"]);
        assert_eq!(store.len(), 3);
        assert_eq!(texts(&store), vec!["four", "three", "two"]);
    }

    #[test]
    fn test_eviction_prefers_low_usage() {
        let (mut store, _) = store_with(3, &["keeper", "middle", "newest"]);
        assert!(store.prepend(&mut Entry::new_text("keeper")));
        assert!(store.prepend(&mut Entry::new_text("overflow")));

        // "middle" is the oldest entry with usage 1
        assert_eq!(texts(&store), vec!["overflow", "keeper", "newest"]);
    }

    #[test]
    fn test_locked_entries_survive_eviction() {
        let (mut store, mut entries) = store_with(2, &["locked one", "other"]);
        assert!(store.toggle_lock(&mut entries[0]));
        assert!(entries[0].locked);

        assert!(store.prepend(&mut Entry::new_text("third")));
        assert!(store.prepend(&mut Entry::new_text("fourth")));
        assert!(store.find(entries[0].id.unwrap()).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_all_locked_stays_over_capacity() {
        let (mut store, mut entries) = store_with(1, &["pinned"]);
        assert!(store.toggle_lock(&mut entries[0]));
        let mut extra = Entry::new_text("extra");
        assert!(store.prepend(&mut extra));
        // "extra" is the only unlocked entry, so it is the victim
        assert_eq!(texts(&store), vec!["pinned"]);
    }

    #[test]
    fn test_update_text_removes_duplicate() {
        let (mut store, mut entries) = store_with(10, &["same", "edit me"]);
        let log = record_events(&mut store);

        entries[1].text = "same".into();
        assert!(store.update(&mut entries[1]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_head().unwrap().id, entries[1].id);
        assert_eq!(*log.borrow(), vec![EventKind::Remove, EventKind::Update]);
    }

    #[test]
    fn test_update_keeps_locked_duplicate() {
        let (mut store, mut entries) = store_with(10, &["locked text", "edit me"]);
        assert!(store.toggle_lock(&mut entries[0]));

        let before = entries[1].clone();
        entries[1].text = "locked text".into();
        assert!(!store.update(&mut entries[1]));
        assert_eq!(store.find(before.id.unwrap()).unwrap().text, "edit me");
    }

    #[test]
    fn test_update_rejects_tag_held_elsewhere() {
        let (mut store, mut entries) = store_with(10, &["a", "b"]);
        entries[0].tag = Some('t');
        assert!(store.update(&mut entries[0]));

        entries[1].tag = Some('t');
        assert!(!store.update(&mut entries[1]));
        assert_eq!(store.find_by_tag('t').unwrap().id, entries[0].id);
    }

    #[test]
    fn test_update_unknown_id() {
        let mut store = HistoryStore::in_memory(10);
        let mut ghost = Entry {
            id: Some(404),
            ..Entry::new_text("ghost")
        };
        assert!(!store.update(&mut ghost));
        assert!(!store.remove(&ghost));
    }

    #[test]
    fn test_remove_refuses_locked() {
        let (mut store, mut entries) = store_with(10, &["keep"]);
        assert!(store.toggle_lock(&mut entries[0]));

        // A stale unlocked copy does not bypass the lock
        let stale = Entry {
            locked: false,
            ..entries[0].clone()
        };
        assert!(!store.remove(&stale));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_head_skips_locked() {
        let (mut store, mut entries) = store_with(10, &["older", "locked head"]);
        assert!(store.toggle_lock(&mut entries[1]));
        assert!(store.remove_head());
        assert_eq!(texts(&store), vec!["locked head"]);
        assert!(!store.remove_head());
    }

    #[test]
    fn test_clear_keeps_locked() {
        let (mut store, mut entries) = store_with(10, &["a", "b", "c"]);
        assert!(store.toggle_lock(&mut entries[1]));
        let log = record_events(&mut store);

        assert!(store.clear());
        assert_eq!(texts(&store), vec!["b"]);
        assert_eq!(*log.borrow(), vec![EventKind::Clear]);
    }

    #[test]
    fn test_events_fire_on_mutations() {
        let mut store = HistoryStore::in_memory(1);
        let log = record_events(&mut store);

        let mut first = Entry::new_text("first");
        store.prepend(&mut first);
        store.prepend(&mut Entry::new_text("second"));
        assert_eq!(*log.borrow(), vec![EventKind::Add, EventKind::Add, EventKind::Remove]);
    }

    #[test]
    fn test_failed_prepend_fires_nothing() {
        let mut store = HistoryStore::in_memory(10);
        let log = record_events(&mut store);
        assert!(!store.prepend(&mut Entry::new_text("")));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_search_case_insensitive_and_masked() {
        let (mut store, mut entries) = store_with(10, &["Hello World", "secret hello", "other"]);
        assert!(store.toggle_mask(&mut entries[1]));

        let found: Vec<String> = store.search("HELLO").into_iter().map(|e| e.text).collect();
        assert_eq!(found, vec!["Hello World"]);
        assert_eq!(store.search("").len(), 3);
    }

    #[test]
    fn test_get_list_is_a_snapshot() {
        let (mut store, _) = store_with(10, &["a", "b"]);
        let snapshot = store.get_list();
        store.clear();
        assert_eq!(snapshot.len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_config_applies_history_section() {
        let mut config = Config::default();
        config.history.max_size = 2;
        config.history.max_similarity_len = 4;

        let store = HistoryStore::from_config(Box::new(MemoryRepository::new()), &config).unwrap();
        assert_eq!(store.capacity(), 2);
        assert_eq!(store.matcher().max_len(), 4);
    }

    #[test]
    fn test_clock_resumes_from_repository() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&Entry {
            recency: 41,
            usage_count: 1,
            ..Entry::new_text("persisted")
        })
        .unwrap();

        let mut store = HistoryStore::with_database(db, 10).unwrap();
        let mut entry = Entry::new_text("fresh");
        assert!(store.prepend(&mut entry));
        assert_eq!(entry.recency, 42);
        assert_eq!(store.get_head().unwrap().text, "fresh");
    }

    /// Repository whose writes fail on demand; reads always pass through
    struct FailingRepository {
        inner: MemoryRepository,
        failing: Rc<Cell<bool>>,
    }

    impl FailingRepository {
        fn check(&self) -> DatabaseResult<()> {
            if self.failing.get() {
                return Err(DatabaseError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            Ok(())
        }
    }

    impl Repository for FailingRepository {
        fn insert(&self, entry: &Entry) -> DatabaseResult<i64> {
            self.check()?;
            self.inner.insert(entry)
        }

        fn update(&self, entry: &Entry) -> DatabaseResult<()> {
            self.check()?;
            self.inner.update(entry)
        }

        fn update_displacing(&self, entry: &Entry, displaced: Option<i64>) -> DatabaseResult<()> {
            self.check()?;
            self.inner.update_displacing(entry, displaced)
        }

        fn delete(&self, id: i64) -> DatabaseResult<()> {
            self.check()?;
            self.inner.delete(id)
        }

        fn delete_unlocked(&self) -> DatabaseResult<usize> {
            self.check()?;
            self.inner.delete_unlocked()
        }

        fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Entry>> {
            self.inner.find_by_id(id)
        }

        fn find_by_text(&self, text: &str) -> DatabaseResult<Option<Entry>> {
            self.inner.find_by_text(text)
        }

        fn find_by_tag(&self, tag: char) -> DatabaseResult<Option<Entry>> {
            self.inner.find_by_tag(tag)
        }

        fn fetch_ordered(&self, limit: Option<usize>) -> DatabaseResult<Vec<Entry>> {
            self.inner.fetch_ordered(limit)
        }

        fn newest_unlocked(&self) -> DatabaseResult<Option<Entry>> {
            self.inner.newest_unlocked()
        }

        fn eviction_candidate(&self) -> DatabaseResult<Option<Entry>> {
            self.inner.eviction_candidate()
        }

        fn count(&self) -> DatabaseResult<u64> {
            self.inner.count()
        }

        fn max_recency(&self) -> DatabaseResult<i64> {
            self.inner.max_recency()
        }
    }

    /// Store over a `FailingRepository` seeded with `texts`, plus its
    /// failure switch
    fn failing_store(texts: &[&str]) -> (HistoryStore, Vec<Entry>, Rc<Cell<bool>>) {
        let failing = Rc::new(Cell::new(false));
        let repo = FailingRepository {
            inner: MemoryRepository::new(),
            failing: Rc::clone(&failing),
        };
        let mut store = HistoryStore::open(Box::new(repo), 10).unwrap();
        let mut entries = Vec::new();
        for text in texts {
            let mut entry = Entry::new_text(*text);
            assert!(store.prepend(&mut entry));
            entries.push(entry);
        }
        failing.set(true);
        (store, entries, failing)
    }

    #[test]
    fn test_failed_write_leaves_prepend_untouched() {
        let (mut store, entries, _) = failing_store(&["alpha", "beta"]);
        let log = record_events(&mut store);
        let before = store.get_list();

        let mut fresh = Entry::new_text("gamma");
        assert!(!store.prepend(&mut fresh));
        assert!(fresh.is_new());

        let mut again = Entry::new_text("alpha");
        assert!(!store.prepend(&mut again));
        assert!(again.is_new());

        assert_eq!(store.get_list(), before);
        assert_eq!(store.find(entries[0].id.unwrap()).unwrap().usage_count, 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_displaced_holder() {
        let (mut store, mut entries, _) = failing_store(&["alpha", "beta"]);
        let log = record_events(&mut store);

        entries[1].text = "alpha".into();
        assert!(!store.update(&mut entries[1]));
        assert_eq!(entries[1].text, "alpha");
        assert_eq!(texts(&store), vec!["beta", "alpha"]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_removed_and_cleared() {
        let (mut store, entries, _) = failing_store(&["alpha", "beta"]);
        let log = record_events(&mut store);

        assert!(!store.remove(&entries[0]));
        assert!(!store.remove_head());
        assert!(!store.clear());
        assert_eq!(texts(&store), vec!["beta", "alpha"]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_recovers_after_write_failure() {
        let (mut store, _, failing) = failing_store(&["alpha"]);
        let mut entry = Entry::new_text("beta");
        assert!(!store.prepend(&mut entry));

        failing.set(false);
        assert!(store.prepend(&mut entry));
        // The failed attempt did not consume a recency stamp
        assert_eq!(entry.recency, 2);
        assert_eq!(texts(&store), vec!["beta", "alpha"]);
    }
}
