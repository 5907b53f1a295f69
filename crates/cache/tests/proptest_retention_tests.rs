//! Property-based tests for LRU retention and catalog ownership.
//!
//! These tests verify the behavioral contracts of cleanup:
//! - Budget: after eviction the retained entries fit the target
//! - Order: evictions always take the least recently used entries first
//! - Minimality: no more entries are evicted than necessary
//! - Ownership: files that aren't entries never reach a deletion list

use buildcache::catalog::CatalogEntry;
use buildcache::policy::{select_for_deletion, sort_by_recency};
use buildcache::{EntryCatalog, MARKER_FILE_NAME, PROPERTIES_FILE_NAME};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Generate a set of entries with unique names, arbitrary sizes and ages
fn entries_strategy() -> impl Strategy<Value = Vec<CatalogEntry>> {
    prop::collection::btree_map("[0-9a-f]{32}", (0u64..10_000, 0i64..1_000), 0..40).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(name, (size, age_secs))| CatalogEntry {
                    path: PathBuf::from("/cache").join(&name),
                    name,
                    size,
                    last_modified: base_time() - Duration::seconds(age_secs),
                })
                .collect()
        },
    )
}

/// Generate names that must never be treated as entries
fn non_entry_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(MARKER_FILE_NAME.to_string()),
        Just(PROPERTIES_FILE_NAME.to_string()),
        "[0-9a-f]{1,31}".prop_map(String::from),
        "[0-9a-f]{33,40}".prop_map(String::from),
        "[g-z][a-z0-9._-]{0,20}".prop_map(String::from),
        "[0-9a-f]{32}\\.(part|tmp|lock)".prop_map(String::from),
    ]
}

// =============================================================================
// Property Tests: Retention policy
// =============================================================================

proptest! {
    /// Contract: retained entries never exceed the target
    #[test]
    fn retained_size_fits_target(entries in entries_strategy(), target in 0u64..200_000) {
        let selection = select_for_deletion(entries, target);
        prop_assert!(selection.retained <= target);
    }

    /// Contract: nothing is evicted when everything already fits
    #[test]
    fn nothing_evicted_under_target(entries in entries_strategy()) {
        let total: u64 = entries.iter().map(|e| e.size).sum();
        let selection = select_for_deletion(entries, total);
        prop_assert!(selection.to_delete.is_empty());
    }

    /// Contract: the deletion list is exactly the oldest prefix in recency order
    #[test]
    fn evictions_are_oldest_first(entries in entries_strategy(), target in 0u64..200_000) {
        let mut sorted = entries.clone();
        sort_by_recency(&mut sorted);

        let selection = select_for_deletion(entries, target);
        let n = selection.to_delete.len();
        prop_assert_eq!(&selection.to_delete[..], &sorted[..n]);
    }

    /// Contract: keeping the last evicted entry would have broken the budget
    #[test]
    fn evictions_are_minimal(entries in entries_strategy(), target in 0u64..200_000) {
        let selection = select_for_deletion(entries, target);
        if let Some(last) = selection.to_delete.last() {
            prop_assert!(selection.retained + last.size > target);
        }
    }

    /// Contract: the selection is independent of input order
    #[test]
    fn selection_is_deterministic(entries in entries_strategy(), target in 0u64..200_000) {
        let mut reversed = entries.clone();
        reversed.reverse();

        let a = select_for_deletion(entries, target);
        let b = select_for_deletion(reversed, target);
        prop_assert_eq!(a, b);
    }
}

// =============================================================================
// Property Tests: Catalog ownership
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Contract: reserved and foreign files never become eviction candidates
    #[test]
    fn non_entries_never_evictable(
        names in prop::collection::btree_set(non_entry_name_strategy(), 1..12),
        entry_names in prop::collection::btree_set("[0-9a-f]{32}", 0..6),
    ) {
        let tmp = TempDir::new().unwrap();
        for name in names.iter().chain(entry_names.iter()) {
            fs::write(tmp.path().join(name), b"data").unwrap();
        }

        let evictable: BTreeSet<String> = EntryCatalog::new(tmp.path())
            .evictable_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();

        prop_assert!(evictable.is_disjoint(&names));
        prop_assert_eq!(evictable, entry_names);
    }
}
