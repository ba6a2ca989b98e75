//! Near-duplicate detection for clipboard captures
//!
//! A selection dragged one character at a time produces a stream of values
//! that differ by a single edit. These are folded into one history slot
//! instead of each becoming its own entry.

use crate::history::HistoryStore;
use crate::models::Entry;

/// Longest prefix (in chars) considered when comparing two texts
pub const DEFAULT_MAX_SIMILARITY_LEN: usize = 1024;

/// Levenshtein distance over chars.
///
/// Two rolling rows; `a` and `b` may be swapped without changing the result.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();

    if a_chars.is_empty() {
        return n;
    }
    if n == 0 {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for (i, &ac) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for j in 1..=n {
            let cost = if ac == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Edits tolerated between texts of these lengths: 3 for short strings,
/// one more per hundred characters of the shorter one.
pub fn similarity_threshold(len_a: usize, len_b: usize) -> usize {
    len_a.min(len_b) / 100 + 3
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatcher {
    max_len: usize,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIMILARITY_LEN)
    }
}

impl SimilarityMatcher {
    pub fn new(max_len: usize) -> Self {
        Self { max_len: max_len.max(1) }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn clamp<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.max_len) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }

    /// Edit distance between the first `max_len` chars of each text
    pub fn distance(&self, a: &str, b: &str) -> usize {
        levenshtein(self.clamp(a), self.clamp(b))
    }

    pub fn is_similar(&self, a: &str, b: &str) -> bool {
        let a = self.clamp(a);
        let b = self.clamp(b);
        let threshold = similarity_threshold(a.chars().count(), b.chars().count());
        levenshtein(a, b) < threshold
    }

    /// First of the `scan_limit` most recent entries similar to `entry`,
    /// skipping `entry` itself. `scan_limit == 0` disables the search.
    pub fn find_similar(&self, store: &HistoryStore, entry: &Entry, scan_limit: usize) -> Option<Entry> {
        if scan_limit == 0 {
            return None;
        }
        store
            .recent(scan_limit)
            .into_iter()
            .filter(|candidate| !candidate.same(entry))
            .find(|candidate| self.is_similar(&candidate.text, &entry.text))
    }
}
