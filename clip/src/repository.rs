//! Backing-store abstraction for clipboard history
//!
//! The history store only needs a handful of primitives from its storage:
//! keyed insert/update/delete, lookups by text and tag, recency-ordered
//! selection and a count. `Database` (SQLite) and `MemoryRepository`
//! implement the same contract, including the uniqueness rules on text and tag,
//! so tests against memory behave like production.

use crate::database::{DatabaseError, DatabaseResult};
use crate::models::Entry;
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub trait Repository {
    /// Insert a row and return its id. Fails on duplicate text or tag.
    fn insert(&self, entry: &Entry) -> DatabaseResult<i64>;

    /// Overwrite every mutable column of the row with `entry.id`
    fn update(&self, entry: &Entry) -> DatabaseResult<()>;

    /// Delete row `displaced` (when given) and update `entry` as one unit:
    /// either both happen or neither does.
    fn update_displacing(&self, entry: &Entry, displaced: Option<i64>) -> DatabaseResult<()>;

    fn delete(&self, id: i64) -> DatabaseResult<()>;

    /// Delete every unlocked row, returning how many went
    fn delete_unlocked(&self) -> DatabaseResult<usize>;

    fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Entry>>;

    fn find_by_text(&self, text: &str) -> DatabaseResult<Option<Entry>>;

    fn find_by_tag(&self, tag: char) -> DatabaseResult<Option<Entry>>;

    /// Rows ordered most recent first, optionally limited
    fn fetch_ordered(&self, limit: Option<usize>) -> DatabaseResult<Vec<Entry>>;

    fn newest_unlocked(&self) -> DatabaseResult<Option<Entry>>;

    /// Unlocked row with the lowest usage count, oldest recency breaking ties
    fn eviction_candidate(&self) -> DatabaseResult<Option<Entry>>;

    fn count(&self) -> DatabaseResult<u64>;

    /// Highest recency stamp in use (0 when empty)
    fn max_recency(&self) -> DatabaseResult<i64>;
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<i64, Entry>,
    last_id: i64,
}

impl MemoryState {
    /// Rows other than `entry` itself and `ignore` must not share its text or tag
    fn check_unique(&self, entry: &Entry, ignore: Option<i64>) -> DatabaseResult<()> {
        for row in self.rows.values() {
            if row.id == entry.id || (ignore.is_some() && row.id == ignore) {
                continue;
            }
            if row.text == entry.text {
                return Err(DatabaseError::Constraint("UNIQUE constraint failed: history.text".into()));
            }
            if entry.tag.is_some() && row.tag == entry.tag {
                return Err(DatabaseError::Constraint("UNIQUE constraint failed: history.tag".into()));
            }
        }
        Ok(())
    }

    fn ordered(&self) -> Vec<&Entry> {
        let mut rows: Vec<&Entry> = self.rows.values().collect();
        rows.sort_by(|a, b| b.recency.cmp(&a.recency).then(b.id.cmp(&a.id)));
        rows
    }
}

/// In-process repository; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn insert(&self, entry: &Entry) -> DatabaseResult<i64> {
        let mut state = self.state.lock();
        let mut row = entry.clone();
        row.id = None;
        state.check_unique(&row, None)?;
        state.last_id += 1;
        let id = state.last_id;
        row.id = Some(id);
        state.rows.insert(id, row);
        Ok(id)
    }

    fn update(&self, entry: &Entry) -> DatabaseResult<()> {
        self.update_displacing(entry, None)
    }

    fn update_displacing(&self, entry: &Entry, displaced: Option<i64>) -> DatabaseResult<()> {
        let id = entry.id.ok_or(DatabaseError::NotFound(0))?;
        let mut state = self.state.lock();
        // Validate everything before touching any row
        if !state.rows.contains_key(&id) {
            return Err(DatabaseError::NotFound(id));
        }
        if let Some(gone) = displaced {
            if !state.rows.contains_key(&gone) {
                return Err(DatabaseError::NotFound(gone));
            }
        }
        state.check_unique(entry, displaced)?;
        if let Some(gone) = displaced {
            state.rows.remove(&gone);
        }
        state.rows.insert(id, entry.clone());
        Ok(())
    }

    fn delete(&self, id: i64) -> DatabaseResult<()> {
        self.state
            .lock()
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound(id))
    }

    fn delete_unlocked(&self) -> DatabaseResult<usize> {
        let mut state = self.state.lock();
        let before = state.rows.len();
        state.rows.retain(|_, row| row.locked);
        Ok(before - state.rows.len())
    }

    fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Entry>> {
        Ok(self.state.lock().rows.get(&id).cloned())
    }

    fn find_by_text(&self, text: &str) -> DatabaseResult<Option<Entry>> {
        Ok(self.state.lock().rows.values().find(|row| row.text == text).cloned())
    }

    fn find_by_tag(&self, tag: char) -> DatabaseResult<Option<Entry>> {
        Ok(self.state.lock().rows.values().find(|row| row.has_tag(tag)).cloned())
    }

    fn fetch_ordered(&self, limit: Option<usize>) -> DatabaseResult<Vec<Entry>> {
        let state = self.state.lock();
        let rows = state.ordered().into_iter().cloned();
        Ok(match limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    fn newest_unlocked(&self) -> DatabaseResult<Option<Entry>> {
        let state = self.state.lock();
        Ok(state.ordered().into_iter().find(|row| !row.locked).cloned())
    }

    fn eviction_candidate(&self) -> DatabaseResult<Option<Entry>> {
        let state = self.state.lock();
        Ok(state
            .rows
            .values()
            .filter(|row| !row.locked)
            .min_by(|a, b| {
                a.usage_count
                    .cmp(&b.usage_count)
                    .then(a.recency.cmp(&b.recency))
                    .then(a.id.cmp(&b.id))
            })
            .cloned())
    }

    fn count(&self) -> DatabaseResult<u64> {
        Ok(self.state.lock().rows.len() as u64)
    }

    fn max_recency(&self) -> DatabaseResult<i64> {
        Ok(self.state.lock().rows.values().map(|row| row.recency).max().unwrap_or(0))
    }
}
