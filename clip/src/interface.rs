//! Clip Interface Definition
//!
//! Public types shared between the history engine and the (external) menu UI,
//! plus the `ClipboardApi` trait the UI drives.

use crate::events::HistoryObserver;
use crate::models::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Whitespace trimming applied to clipboard text before comparison and storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrimMode {
    #[default]
    Off,
    #[serde(alias = "trim-trailing")]
    Trailing,
    #[serde(alias = "trim-leading")]
    Leading,
    #[serde(alias = "trim-both")]
    Both,
}

impl TrimMode {
    pub fn apply<'a>(&self, text: &'a str) -> &'a str {
        match self {
            TrimMode::Off => text,
            TrimMode::Trailing => text.trim_end(),
            TrimMode::Leading => text.trim_start(),
            TrimMode::Both => text.trim(),
        }
    }

    /// Cycle order used by the menu toggle: off → trailing → leading → both → off
    pub fn next(self) -> Self {
        match self {
            TrimMode::Off => TrimMode::Trailing,
            TrimMode::Trailing => TrimMode::Leading,
            TrimMode::Leading => TrimMode::Both,
            TrimMode::Both => TrimMode::Off,
        }
    }
}

/// Discriminant of a `HistoryEvent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Remove,
    Update,
    Clear,
}

/// Change notification fired by the history store.
/// Payloads are clones; observers never see the store's own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Add(Entry),
    Remove(Entry),
    Update(Entry),
    Clear,
}

impl HistoryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HistoryEvent::Add(_) => EventKind::Add,
            HistoryEvent::Remove(_) => EventKind::Remove,
            HistoryEvent::Update(_) => EventKind::Update,
            HistoryEvent::Clear => EventKind::Clear,
        }
    }

    pub fn entry(&self) -> Option<&Entry> {
        match self {
            HistoryEvent::Add(entry) | HistoryEvent::Remove(entry) | HistoryEvent::Update(entry) => Some(entry),
            HistoryEvent::Clear => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error taxonomy for history operations.
/// Never crosses the `HistoryStore` boundary: public operations log it and
/// report a boolean instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Entry {0} not found")]
    NotFound(i64),
}

impl From<crate::database::DatabaseError> for ClipError {
    fn from(e: crate::database::DatabaseError) -> Self {
        match e {
            crate::database::DatabaseError::NotFound(id) => ClipError::NotFound(id),
            other => ClipError::Storage(other.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The surface the menu UI drives.
///
/// Mutating operations take the caller's copy of an entry by `&mut` and update
/// it to the persisted state on success; on failure the copy is left exactly as
/// it was passed in.
pub trait ClipboardApi {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Snapshot of history, most recent first
    fn get_history(&self) -> Vec<Entry>;

    /// The entry the controller considers authoritative
    fn get_current(&self) -> &Entry;

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reconcile a new value (or `None` for an empty observation) against the
    /// current one. Returns true when a new value was accepted as current.
    fn set(&mut self, entry: Option<Entry>, force: bool) -> bool;

    fn toggle_lock(&mut self, entry: &mut Entry) -> bool;

    fn toggle_mask(&mut self, entry: &mut Entry) -> bool;

    /// Toggle `tag` on the entry. Rejected when another entry holds the tag.
    fn tag(&mut self, entry: &mut Entry, tag: char) -> bool;

    /// Append the next-older entry's text to `left` (space separated) and drop it
    fn join(&mut self, left: &mut Entry) -> bool;

    fn to_upper(&mut self, entry: &mut Entry) -> bool;

    fn to_lower(&mut self, entry: &mut Entry) -> bool;

    fn trim(&mut self, entry: &mut Entry) -> bool;

    /// Returns the new enabled state
    fn toggle_history_enabled(&mut self) -> bool;

    /// Advance to the next trim mode and return it
    fn next_trim_mode(&mut self) -> TrimMode;

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn remove(&mut self, entry: &Entry) -> bool;

    /// Drop unlocked history and empty the clipboard
    fn clear(&mut self);

    // ─────────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────────

    fn subscribe(&mut self, observer: Box<dyn HistoryObserver>);
}
