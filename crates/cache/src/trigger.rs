//! Time gate deciding whether a cleanup pass is due
//!
//! The gate persists a single timestamp: the mtime of the marker file. Checking
//! it costs one `stat`, so builds inside the interval never scan the cache
//! directory.

use crate::clock::Clock;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use filetime::FileTime;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Observed state of the trigger marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// No marker yet; the first evaluation is always due
    NoMarker,
    /// Last evaluation is younger than the interval
    Fresh {
        /// When cleanup was last evaluated
        last_evaluated: DateTime<Utc>,
    },
    /// Last evaluation is at least one interval old
    Stale {
        /// When cleanup was last evaluated
        last_evaluated: DateTime<Utc>,
    },
}

impl TriggerState {
    /// Whether a cleanup pass should run
    #[must_use]
    pub const fn is_due(self) -> bool {
        !matches!(self, Self::Fresh { .. })
    }
}

/// Persisted-timestamp gate for cleanup passes
#[derive(Debug, Clone)]
pub struct TriggerGate {
    marker: PathBuf,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl TriggerGate {
    /// Create a gate over `marker` that fires once per `interval`
    #[must_use]
    pub fn new(marker: impl Into<PathBuf>, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            marker: marker.into(),
            interval,
            clock,
        }
    }

    /// Marker file path
    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Read the marker and classify it against the interval
    ///
    /// A marker dated at most one interval in the future (clock skew) counts as
    /// fresh; one dated further ahead counts as stale. A marker that exists but
    /// cannot be read counts as missing so cleanup is not starved.
    #[must_use]
    pub fn state(&self) -> TriggerState {
        let modified = match fs::metadata(&self.marker).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        marker = %self.marker.display(),
                        error = %e,
                        "Cleanup marker unreadable, treating as missing"
                    );
                }
                return TriggerState::NoMarker;
            }
        };

        let age = self.clock.now().signed_duration_since(modified);
        // Up to one interval of forward skew is tolerated; beyond that the
        // marker is treated as stale so it gets re-stamped to the current time.
        if age < self.interval && age >= -self.interval {
            TriggerState::Fresh {
                last_evaluated: modified,
            }
        } else {
            TriggerState::Stale {
                last_evaluated: modified,
            }
        }
    }

    /// Whether a cleanup pass should run now
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.state().is_due()
    }

    /// Record that cleanup was evaluated now, creating the marker if needed
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the marker cannot be created or stamped.
    pub fn mark_evaluated(&self) -> Result<()> {
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.marker)
            .map_err(|e| Error::io(e, &self.marker, "create"))?;

        let now = FileTime::from_system_time(SystemTime::from(self.clock.now()));
        filetime::set_file_mtime(&self.marker, now)
            .map_err(|e| Error::io(e, &self.marker, "set_mtime"))?;
        Ok(())
    }
}
