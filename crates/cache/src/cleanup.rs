//! Cleanup pass orchestration
//!
//! A pass lists the cache directory, measures it, evicts least recently used
//! entries until the directory fits its budget, and re-stamps the trigger
//! marker. Cleanup is best-effort: nothing here ever fails the build. Per-entry
//! delete failures are logged and skipped, and a directory that cannot be
//! listed abandons the pass without touching the marker so the next build
//! retries.

use crate::catalog::{Candidate, CatalogEntry, EntryCatalog};
use crate::config::RetentionTarget;
use crate::policy::select_for_deletion;
use crate::size::{format_size, reserved_size, to_megabytes, total_size};
use crate::trigger::TriggerGate;
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Statistics from one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Number of evictable entries scanned
    pub entries_scanned: usize,
    /// Number of entries removed (or already gone)
    pub entries_removed: usize,
    /// Number of selected entries that could not be removed
    pub failed_deletions: usize,
    /// Bytes freed
    pub bytes_freed: u64,
    /// Owned size (entries plus control files) before the pass
    pub size_before: u64,
    /// Owned size after the pass
    pub size_after: u64,
    /// The cache still exceeds its target after the pass
    pub over_budget: bool,
    /// Wall time of the pass
    pub duration: Duration,
}

/// Result of asking the executor to clean up
#[derive(Debug)]
pub enum CleanupOutcome {
    /// The trigger interval has not elapsed; nothing was scanned
    NotDue,
    /// A pass ran to completion
    Completed(CleanupStats),
    /// The cache directory could not be scanned; the pass was skipped
    Abandoned(Error),
}

impl CleanupOutcome {
    /// Whether a pass actually ran
    #[must_use]
    pub const fn ran(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Statistics of a completed pass
    #[must_use]
    pub const fn stats(&self) -> Option<&CleanupStats> {
        match self {
            Self::Completed(stats) => Some(stats),
            Self::NotDue | Self::Abandoned(_) => None,
        }
    }
}

/// Remove a file, treating an already-absent path as success
///
/// Returns `true` if this call removed the file.
///
/// # Errors
///
/// Returns the I/O error for any failure other than `NotFound`.
pub fn delete_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Runs time-gated LRU cleanup over one cache directory
#[derive(Debug, Clone)]
pub struct CleanupExecutor {
    catalog: EntryCatalog,
    target: RetentionTarget,
    gate: TriggerGate,
    dry_run: bool,
}

impl CleanupExecutor {
    /// Create an executor for `root` with a validated budget and trigger gate
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, target: RetentionTarget, gate: TriggerGate) -> Self {
        Self {
            catalog: EntryCatalog::new(root),
            target,
            gate,
            dry_run: false,
        }
    }

    /// Report what would be deleted without deleting or stamping the marker
    #[must_use]
    pub const fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Cache directory this executor cleans
    #[must_use]
    pub fn root(&self) -> &Path {
        self.catalog.root()
    }

    /// Trigger gate consulted by [`run_if_due`](Self::run_if_due)
    #[must_use]
    pub const fn gate(&self) -> &TriggerGate {
        &self.gate
    }

    /// Run a pass if the trigger interval has elapsed
    ///
    /// When not due this costs a single marker `stat` and never lists the
    /// cache directory.
    #[must_use]
    pub fn run_if_due(&self) -> CleanupOutcome {
        if !self.gate.is_due() {
            tracing::trace!(dir = %self.root().display(), "Build cache cleanup not due");
            return CleanupOutcome::NotDue;
        }
        self.run_now()
    }

    /// Run a pass regardless of the trigger marker
    #[must_use]
    pub fn run_now(&self) -> CleanupOutcome {
        match self.pass() {
            Ok(stats) => CleanupOutcome::Completed(stats),
            Err(e) => {
                tracing::warn!(
                    dir = %self.root().display(),
                    error = %e,
                    "Build cache cleanup skipped"
                );
                CleanupOutcome::Abandoned(e)
            }
        }
    }

    fn pass(&self) -> Result<CleanupStats> {
        let start = Instant::now();

        let candidates: Vec<Candidate> = self.catalog.list()?.collect();
        let reserved = reserved_size(&candidates);
        let entries: Vec<CatalogEntry> = candidates
            .into_iter()
            .filter_map(Candidate::into_evictable)
            .collect();

        let stats = CleanupStats {
            entries_scanned: entries.len(),
            size_before: reserved.saturating_add(total_size(&entries)),
            ..CleanupStats::default()
        };

        // Control files count against the budget; foreign data does not.
        let entry_budget = self.target.bytes().saturating_sub(reserved);
        let selection = select_for_deletion(entries, entry_budget);

        Ok(self.finish(stats, &selection.to_delete, start))
    }

    /// Evict the selected entries, stamp the marker and report
    fn finish(
        &self,
        mut stats: CleanupStats,
        to_delete: &[CatalogEntry],
        start: Instant,
    ) -> CleanupStats {
        if self.dry_run {
            for entry in to_delete {
                tracing::info!(
                    path = %entry.path.display(),
                    size = %format_size(entry.size),
                    last_modified = %entry.last_modified,
                    "[dry-run] Would remove cache entry"
                );
            }
        } else {
            delete_entries(to_delete, &mut stats);
        }

        stats.size_after = stats.size_before.saturating_sub(stats.bytes_freed);
        stats.over_budget = stats.size_after > self.target.bytes();
        if stats.over_budget && !self.dry_run {
            tracing::warn!(
                dir = %self.root().display(),
                current_mb = to_megabytes(stats.size_after),
                target_mb = self.target.megabytes(),
                failed = stats.failed_deletions,
                "Build cache still exceeds its target size after cleanup"
            );
        }

        if !self.dry_run
            && let Err(e) = self.gate.mark_evaluated()
        {
            tracing::warn!(error = %e, "Failed to update build cache cleanup marker");
        }

        stats.duration = start.elapsed();
        tracing::info!(
            dir = %self.root().display(),
            scanned = stats.entries_scanned,
            removed = stats.entries_removed,
            freed_mb = to_megabytes(stats.bytes_freed),
            current_mb = to_megabytes(stats.size_after),
            "cache cleaned up in {:.2?}",
            stats.duration
        );

        stats
    }
}

/// Delete each entry in order, recording results in `stats`
///
/// A failed delete is logged and counted; the remaining entries are still
/// attempted.
fn delete_entries(entries: &[CatalogEntry], stats: &mut CleanupStats) {
    for entry in entries {
        match delete_if_exists(&entry.path) {
            Ok(removed) => {
                tracing::debug!(
                    path = %entry.path.display(),
                    size = entry.size,
                    already_gone = !removed,
                    "Removed cache entry"
                );
                stats.entries_removed += 1;
                stats.bytes_freed = stats.bytes_freed.saturating_add(entry.size);
            }
            Err(e) => {
                tracing::warn!(
                    path = %entry.path.display(),
                    error = %e,
                    "Failed to remove cache entry"
                );
                stats.failed_deletions += 1;
            }
        }
    }
}
