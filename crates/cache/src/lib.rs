//! Local build cache with time-gated LRU cleanup
//!
//! This crate keeps a directory of immutable, content-addressed build artifacts
//! under a configured size budget:
//! - Entry discovery that tolerates broken links and foreign files
//! - Size accounting against a validated `targetSizeInMB` budget
//! - Least-recently-used eviction with deterministic ordering
//! - A persisted trigger marker so a full scan runs at most once per interval
//!
//! # Overview
//!
//! Each build opens a [`LocalCache`] and calls
//! [`LocalCache::run_cleanup_if_due`]. Inside the cleanup interval that costs a
//! single `stat` of the marker file. Once the interval has elapsed the cache
//! directory is listed, the oldest entries are evicted until the directory fits
//! its budget, and the marker is re-stamped whether or not anything was
//! deleted.
//!
//! # Recency
//!
//! An entry's mtime is both its creation time and its last-use time:
//! [`LocalCache::load`] and [`LocalCache::record_access`] refresh it, so a
//! reused entry always sorts newest.

mod error;

pub mod catalog;
pub mod cleanup;
pub mod clock;
pub mod config;
pub mod key;
pub mod policy;
pub mod size;
pub mod store;
pub mod trigger;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use catalog::{Candidate, CatalogEntry, EntryCatalog, MARKER_FILE_NAME, PROPERTIES_FILE_NAME};
pub use cleanup::{CleanupExecutor, CleanupOutcome, CleanupStats, delete_if_exists};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, RetentionTarget, validate_target_size};
pub use key::CacheKey;
pub use policy::{Selection, select_for_deletion};
pub use store::LocalCache;
pub use trigger::{TriggerGate, TriggerState};
