//! ClipboardController - reconciles the system clipboard with history
//!
//! `set` is a pure reconciliation step run on every poll tick and every user
//! action. It compares an incoming value against `current` (after trimming)
//! and decides whether to ignore it, re-assert the current value, or accept
//! it: provider write first, then the history mutation.
//!
//! Invariant: after `set` returns, the provider was last written with
//! `current.text` (or left untouched when there was nothing to write).

use crate::config::Config;
use crate::events::HistoryObserver;
use crate::history::HistoryStore;
use crate::interface::{ClipboardApi, TrimMode};
use crate::models::Entry;
use crate::provider::{GuardedProvider, Provider};
use tracing::{debug, info, trace, warn};

/// Default number of recent entries checked for near-duplicates
pub const DEFAULT_SCAN_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub enabled: bool,
    pub trim_mode: TrimMode,
    /// 0 disables similarity folding
    pub scan_limit: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trim_mode: TrimMode::Off,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            enabled: config.history.enabled,
            trim_mode: config.trim_mode,
            scan_limit: config.history.similarity_scan_limit,
        }
    }
}

pub struct ClipboardController {
    provider: GuardedProvider<Box<dyn Provider>>,
    history: HistoryStore,
    current: Entry,
    enabled: bool,
    trim_mode: TrimMode,
    scan_limit: usize,
}

impl ClipboardController {
    /// Controller over `history` with the recording settings from `config`
    pub fn from_config(provider: Box<dyn Provider>, history: HistoryStore, config: &Config) -> Self {
        Self::new(provider, history, ControllerSettings::from(config))
    }

    pub fn new(provider: Box<dyn Provider>, history: HistoryStore, settings: ControllerSettings) -> Self {
        Self {
            provider: GuardedProvider::new(provider),
            history,
            current: Entry::default(),
            enabled: settings.enabled,
            trim_mode: settings.trim_mode,
            scan_limit: settings.scan_limit,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn provider(&self) -> &GuardedProvider<Box<dyn Provider>> {
        &self.provider
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn trim_mode(&self) -> TrimMode {
        self.trim_mode
    }

    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// Convenience for `set` with a fresh text entry
    pub fn set_text(&mut self, text: &str) -> bool {
        self.set(Some(Entry::new_text(text)), false)
    }

    /// One reconciliation tick: read the provider and feed any change to `set`.
    /// Returns true when a new value was accepted.
    pub fn poll(&mut self) -> bool {
        if !self.provider.is_ready() {
            trace!("provider not ready; skipping tick");
            return false;
        }
        let observed = self.provider.get_current();
        if observed.as_deref().unwrap_or("") == self.current.text {
            return false;
        }
        trace!(len = observed.as_ref().map(|t| t.len()), "clipboard changed externally");
        self.set(observed.map(Entry::new_text), false)
    }

    pub fn is_synced_with_provider(&self) -> bool {
        self.provider.get_current().unwrap_or_default() == self.current.text
    }

    pub fn sync_with_provider(&mut self) -> bool {
        self.poll()
    }

    /// Persist edits to a stored entry. When it is the current entry, the
    /// provider is updated to its new text as well.
    pub fn replace(&mut self, entry: &mut Entry) -> bool {
        if !self.history.update(entry) {
            return false;
        }
        if entry.same(&self.current) {
            self.current = entry.clone();
            self.provider.set_current(&self.current.text);
        }
        true
    }

    /// Apply `change` to a copy of `entry` and persist it; `entry` only
    /// changes when the write succeeded.
    fn edit(&mut self, entry: &mut Entry, change: impl FnOnce(&mut Entry)) -> bool {
        let mut changed = entry.clone();
        change(&mut changed);
        if self.replace(&mut changed) {
            *entry = changed;
            true
        } else {
            false
        }
    }

    /// Write the trimmed current value back to the provider. A stored current
    /// entry whose text trimming changed is persisted first, so history and
    /// clipboard agree.
    fn reassert(&mut self, clean_current: String) {
        if clean_current != self.current.text {
            if self.current.is_new() {
                self.current.text = clean_current;
            } else {
                let mut trimmed = self.current.clone();
                trimmed.text = clean_current;
                if self.replace(&mut trimmed) {
                    return;
                }
                warn!(id = ?self.current.id, "trimmed current value not persisted; keeping stored text");
            }
        }
        self.provider.set_current(&self.current.text);
    }

    /// Fold `accepted` into a recent near-duplicate, or prepend it.
    fn record(&mut self, accepted: &mut Entry) {
        let similar = self
            .history
            .get_similar(accepted, self.scan_limit)
            .filter(|candidate| !candidate.locked);

        if let Some(mut target) = similar {
            if !accepted.is_new() && !target.same(accepted) {
                // The request named a stored entry that is about to be merged away
                self.history.remove(accepted);
            }
            target.text = accepted.text.clone();
            if self.history.prepend(&mut target) {
                debug!(id = ?target.id, "folded clipboard value into similar entry");
                *accepted = target;
                return;
            }
            warn!("similarity fold failed; recording as a plain entry");
        }

        if !self.history.prepend(accepted) {
            warn!("clipboard value not recorded in history");
        }
    }
}

impl ClipboardApi for ClipboardController {
    fn get_history(&self) -> Vec<Entry> {
        self.history.get_list()
    }

    fn get_current(&self) -> &Entry {
        &self.current
    }

    fn set(&mut self, entry: Option<Entry>, force: bool) -> bool {
        let incoming = entry.unwrap_or_default();
        let clean_new = self.trim_mode.apply(&incoming.text).to_string();
        let clean_current = self.trim_mode.apply(&self.current.text).to_string();

        if clean_new.is_empty() {
            if !clean_current.is_empty() {
                trace!("empty clipboard observation; re-asserting current value");
                self.reassert(clean_current);
                return false;
            }
            // Nothing usable on either side: the head is garbage, unless locked
            let Some(head) = self.history.get_head() else {
                return false;
            };
            if head.locked {
                debug!(id = ?head.id, "unusable history head is locked; leaving it");
                return false;
            }
            if !self.history.remove(&head) {
                return false;
            }
            debug!(id = ?head.id, "dropped unusable history head");
            return match self.history.get_head() {
                Some(next) => self.set(Some(next), force),
                None => false,
            };
        }

        if clean_new == clean_current && !force {
            trace!("clipboard value unchanged");
            self.reassert(clean_current);
            return false;
        }

        self.provider.set_current(&clean_new);
        let mut accepted = Entry {
            text: clean_new,
            ..incoming
        };
        if self.enabled {
            self.record(&mut accepted);
        } else {
            trace!("history disabled; updating current only");
        }
        debug!(id = ?accepted.id, "accepted new clipboard value");
        self.current = accepted;
        true
    }

    fn toggle_lock(&mut self, entry: &mut Entry) -> bool {
        self.edit(entry, |e| e.locked = !e.locked)
    }

    fn toggle_mask(&mut self, entry: &mut Entry) -> bool {
        self.edit(entry, |e| e.masked = !e.masked)
    }

    fn tag(&mut self, entry: &mut Entry, tag: char) -> bool {
        self.edit(entry, |e| {
            e.tag = if e.has_tag(tag) { None } else { Some(tag) };
        })
    }

    fn join(&mut self, left: &mut Entry) -> bool {
        let Some(left_id) = left.id else {
            warn!("cannot join an entry that has not been stored");
            return false;
        };
        let list = self.history.get_list();
        let Some(pos) = list.iter().position(|e| e.id == Some(left_id)) else {
            warn!(id = left_id, "join target not in history");
            return false;
        };
        let Some(right) = list.get(pos + 1) else {
            debug!(id = left_id, "nothing to join: entry has no successor");
            return false;
        };
        if right.locked {
            warn!(id = ?right.id, "refusing to join a locked entry");
            return false;
        }

        let right = right.clone();
        let mut joined = left.clone();
        joined.text = format!("{} {}", left.text, right.text);
        // Persist the left side first so a failure leaves both entries intact
        if !self.replace(&mut joined) {
            return false;
        }
        if !self.history.remove(&right) {
            warn!(id = ?right.id, "joined entry could not be removed");
        }
        *left = joined;
        true
    }

    fn to_upper(&mut self, entry: &mut Entry) -> bool {
        self.edit(entry, |e| e.text = e.text.to_uppercase())
    }

    fn to_lower(&mut self, entry: &mut Entry) -> bool {
        self.edit(entry, |e| e.text = e.text.to_lowercase())
    }

    fn trim(&mut self, entry: &mut Entry) -> bool {
        self.edit(entry, |e| e.text = e.text.trim().to_string())
    }

    fn toggle_history_enabled(&mut self) -> bool {
        self.enabled = !self.enabled;
        info!(enabled = self.enabled, "history recording toggled");
        if self.enabled && !self.current.text.is_empty() {
            let mut current = self.current.clone();
            if self.history.prepend(&mut current) {
                self.current = current;
            }
        }
        self.enabled
    }

    fn next_trim_mode(&mut self) -> TrimMode {
        self.trim_mode = self.trim_mode.next();
        debug!(mode = ?self.trim_mode, "trim mode changed");
        self.trim_mode
    }

    fn remove(&mut self, entry: &Entry) -> bool {
        self.history.remove(entry)
    }

    fn clear(&mut self) {
        self.history.clear();
        self.provider.clear();
        self.current = Entry::default();
        info!("clipboard and unlocked history cleared");
    }

    fn subscribe(&mut self, observer: Box<dyn HistoryObserver>) {
        self.history.subscribe(observer);
    }
}
