//! Core data model for clipboard history
//!
//! An `Entry` is a plain value: the store hands out clones and persists
//! changes explicitly through `HistoryStore::update`.

use serde::{Deserialize, Serialize};

/// Shown in menus instead of the contents of a masked entry.
pub const MASKED_DISPLAY_TEXT: &str = "********";

/// One recorded clipboard value plus its history metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// `None` until the entry has been persisted
    pub id: Option<i64>,
    pub text: String,
    /// Bumped every time the entry is promoted to the head of history
    pub usage_count: u32,
    /// Locked entries survive eviction, `clear()` and ordinary removal
    pub locked: bool,
    /// Single-character quick-access tag, unique across the store
    pub tag: Option<char>,
    /// Hide the contents when rendering menus
    pub masked: bool,
    /// Monotonic stamp assigned by the store on insert/promote (higher = more recent)
    pub recency: i64,
    pub timestamp_unix: i64,
}

impl Entry {
    /// Create a new, unpersisted text entry
    pub fn new_text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            usage_count: 0,
            locked: false,
            tag: None,
            masked: false,
            recency: 0,
            timestamp_unix: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Same persisted entry (by id). Unsaved entries are never the same as anything.
    pub fn same(&self, other: &Entry) -> bool {
        self.id.is_some() && self.id == other.id
    }

    /// Equal by id, or by text when either side has not been persisted yet
    pub fn equals(&self, other: &Entry) -> bool {
        self.same(other) || self.text == other.text
    }

    pub fn has_tag(&self, tag: char) -> bool {
        self.tag == Some(tag)
    }

    /// Single-line preview for menus: whitespace collapsed, truncated to
    /// `max_chars` characters, masked entries replaced entirely.
    pub fn display_text(&self, max_chars: usize) -> String {
        if self.masked {
            return MASKED_DISPLAY_TEXT.to_string();
        }
        let normalized = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.chars().count() <= max_chars {
            return normalized;
        }
        let mut truncated: String = normalized.chars().take(max_chars.saturating_sub(1)).collect();
        truncated.push('…');
        truncated
    }
}

impl From<&str> for Entry {
    fn from(text: &str) -> Self {
        Entry::new_text(text)
    }
}

impl From<String> for Entry {
    fn from(text: String) -> Self {
        Entry::new_text(text)
    }
}
