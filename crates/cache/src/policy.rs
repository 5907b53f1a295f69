//! Least-recently-used retention policy

use crate::catalog::CatalogEntry;
use crate::size::total_size;

/// Entries chosen for eviction by [`select_for_deletion`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Entries to delete, oldest first
    pub to_delete: Vec<CatalogEntry>,
    /// Size of all considered entries before eviction
    pub total_before: u64,
    /// Size of the entries that are kept
    pub retained: u64,
}

impl Selection {
    /// Bytes released if every selected entry is deleted
    #[must_use]
    pub fn bytes_to_free(&self) -> u64 {
        self.total_before.saturating_sub(self.retained)
    }
}

/// Sort entries oldest first, ties broken by name
pub fn sort_by_recency(entries: &mut [CatalogEntry]) {
    entries.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Choose the least recently used entries to evict until `target_bytes` is met
///
/// Nothing is selected when the entries already fit. Otherwise the oldest
/// remaining entry is dropped until the retained total is at or below the
/// target, so only as many entries as necessary are evicted and always in
/// increasing recency.
#[must_use]
pub fn select_for_deletion(mut entries: Vec<CatalogEntry>, target_bytes: u64) -> Selection {
    let total_before = total_size(&entries);
    if total_before <= target_bytes {
        return Selection {
            to_delete: Vec::new(),
            total_before,
            retained: total_before,
        };
    }

    sort_by_recency(&mut entries);

    let mut retained = total_before;
    let mut cut = 0;
    for entry in &entries {
        if retained <= target_bytes {
            break;
        }
        retained = retained.saturating_sub(entry.size);
        cut += 1;
    }

    entries.truncate(cut);

    Selection {
        to_delete: entries,
        total_before,
        retained,
    }
}
