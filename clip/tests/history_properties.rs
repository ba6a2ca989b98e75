//! Property tests for the history store invariants: capacity bound, lock
//! immunity and text uniqueness, over arbitrary operation sequences.

use clip::{Entry, HistoryStore};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Prepend(u8),
    Lock(u8),
    Remove(u8),
    Retext(u8, u8),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u8..24).prop_map(Op::Prepend),
        2 => (0u8..24).prop_map(Op::Lock),
        1 => (0u8..24).prop_map(Op::Remove),
        2 => (0u8..24, 0u8..24).prop_map(|(a, b)| Op::Retext(a, b)),
        1 => Just(Op::Clear),
    ]
}

fn text(n: u8) -> String {
    format!("value-{}", n)
}

fn by_text(store: &HistoryStore, n: u8) -> Option<Entry> {
    store.get_list().into_iter().find(|e| e.text == text(n))
}

fn locked_ids(store: &HistoryStore) -> HashSet<i64> {
    store
        .get_list()
        .into_iter()
        .filter(|e| e.locked)
        .filter_map(|e| e.id)
        .collect()
}

proptest! {
    #[test]
    fn prop_capacity_exact_without_locks(capacity in 1usize..10, count in 0usize..40) {
        let mut store = HistoryStore::in_memory(capacity);
        for i in 0..count {
            let mut entry = Entry::new_text(format!("entry {}", i));
            prop_assert!(store.prepend(&mut entry));
        }
        prop_assert_eq!(store.len(), count.min(capacity));

        // All usage counts are 1, so the newest `capacity` survive
        let kept: Vec<String> = store.get_list().into_iter().map(|e| e.text).collect();
        let expected: Vec<String> = (0..count).rev().take(capacity).map(|i| format!("entry {}", i)).collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn prop_invariants_hold_over_any_sequence(
        capacity in 1usize..8,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut store = HistoryStore::in_memory(capacity);

        for op in ops {
            let locked_before = locked_ids(&store);
            let mut unlocking = None;

            match op {
                Op::Prepend(n) => {
                    store.prepend(&mut Entry::new_text(text(n)));
                }
                Op::Lock(n) => {
                    if let Some(mut entry) = by_text(&store, n) {
                        if entry.locked {
                            unlocking = entry.id;
                        }
                        store.toggle_lock(&mut entry);
                    }
                }
                Op::Remove(n) => {
                    if let Some(entry) = by_text(&store, n) {
                        store.remove(&entry);
                    }
                }
                Op::Retext(a, b) => {
                    if let Some(mut entry) = by_text(&store, a) {
                        entry.text = text(b);
                        store.update(&mut entry);
                    }
                }
                Op::Clear => {
                    store.clear();
                }
            }

            let list = store.get_list();

            // Text uniqueness
            let distinct: HashSet<&str> = list.iter().map(|e| e.text.as_str()).collect();
            prop_assert_eq!(distinct.len(), list.len());

            // Lock immunity: only an explicit unlock lets a locked entry go
            let present: HashSet<i64> = list.iter().filter_map(|e| e.id).collect();
            for id in locked_before {
                if Some(id) != unlocking {
                    prop_assert!(present.contains(&id), "locked entry {} disappeared", id);
                }
            }

            // Capacity, unless locked entries alone exceed it
            let locked_now = list.iter().filter(|e| e.locked).count();
            prop_assert!(list.len() <= capacity.max(locked_now));
        }
    }
}
