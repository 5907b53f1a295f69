//! Size accounting for cache contents

use crate::catalog::{Candidate, CatalogEntry};
use crate::config::BYTES_PER_MB;

/// Total size of a set of entries in bytes
///
/// Unreadable entries were catalogued with size zero and add nothing.
#[must_use]
pub fn total_size<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> u64 {
    entries
        .into_iter()
        .fold(0u64, |acc, e| acc.saturating_add(e.size))
}

/// Total size of the reserved control files in a listing
#[must_use]
pub fn reserved_size<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> u64 {
    candidates
        .into_iter()
        .filter_map(|c| match c {
            Candidate::Reserved { size, .. } => Some(*size),
            _ => None,
        })
        .fold(0u64, u64::saturating_add)
}

/// Whole megabytes, rounded down
#[must_use]
pub const fn to_megabytes(bytes: u64) -> u64 {
    bytes / BYTES_PER_MB
}

/// Human-readable size for log output
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    if bytes >= BYTES_PER_MB {
        format!("{} MB", to_megabytes(bytes))
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{bytes} B")
    }
}
