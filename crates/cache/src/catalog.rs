//! Directory listing and classification of cache contents
//!
//! The catalog walks the direct children of a cache directory and tags each one.
//! Metadata failures on a single child never abort the walk: a broken link with
//! an entry name is reported as [`Candidate::Unreadable`] so it can still be
//! evicted, while anything the cache doesn't own is [`Candidate::Foreign`].

use crate::key::is_entry_name;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, Metadata, ReadDir};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File whose mtime records the last cleanup evaluation
pub const MARKER_FILE_NAME: &str = "gc.properties";

/// File holding cache layout properties
pub const PROPERTIES_FILE_NAME: &str = "cache.properties";

/// Control files owned by the cache that are never entries
pub const RESERVED_FILE_NAMES: [&str; 2] = [MARKER_FILE_NAME, PROPERTIES_FILE_NAME];

/// An entry that cleanup may measure and delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// File name (the hex key)
    pub name: String,
    /// Full path of the entry
    pub path: PathBuf,
    /// Size in bytes; zero when the entry is unreadable
    pub size: u64,
    /// Last write or access, whichever happened last
    pub last_modified: DateTime<Utc>,
}

/// Classification of one cache directory child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A readable cache entry
    Entry(CatalogEntry),
    /// An entry-named path whose metadata cannot be read (e.g. a broken link)
    Unreadable(CatalogEntry),
    /// A control file owned by the cache
    Reserved {
        /// Path of the control file
        path: PathBuf,
        /// Size in bytes, zero when unreadable
        size: u64,
    },
    /// Anything else; never touched
    Foreign {
        /// Path of the foreign child
        path: PathBuf,
    },
}

impl Candidate {
    /// The entry if this candidate may be evicted
    #[must_use]
    pub fn as_evictable(&self) -> Option<&CatalogEntry> {
        match self {
            Self::Entry(entry) | Self::Unreadable(entry) => Some(entry),
            Self::Reserved { .. } | Self::Foreign { .. } => None,
        }
    }

    /// Consume into the entry if this candidate may be evicted
    #[must_use]
    pub fn into_evictable(self) -> Option<CatalogEntry> {
        match self {
            Self::Entry(entry) | Self::Unreadable(entry) => Some(entry),
            Self::Reserved { .. } | Self::Foreign { .. } => None,
        }
    }

    /// Path of the classified child
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Entry(entry) | Self::Unreadable(entry) => &entry.path,
            Self::Reserved { path, .. } | Self::Foreign { path } => path,
        }
    }
}

/// Restartable, non-recursive listing of a cache directory
#[derive(Debug, Clone)]
pub struct EntryCatalog {
    root: PathBuf,
}

impl EntryCatalog {
    /// Create a catalog for the given cache directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache directory being listed
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh traversal
    ///
    /// Each call reopens the directory, so a catalog can be walked any number
    /// of times and always reflects the current contents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanFailed`] if the directory cannot be opened.
    pub fn list(&self) -> Result<CatalogIter> {
        let inner = fs::read_dir(&self.root).map_err(|e| Error::scan_failed(e, &self.root))?;
        Ok(CatalogIter {
            root: self.root.clone(),
            inner,
        })
    }

    /// Collect every evictable entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanFailed`] if the directory cannot be opened.
    pub fn evictable_entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self
            .list()?
            .filter_map(Candidate::into_evictable)
            .collect())
    }
}

/// Lazy iterator over classified cache directory children
#[derive(Debug)]
pub struct CatalogIter {
    root: PathBuf,
    inner: ReadDir,
}

impl Iterator for CatalogIter {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            match self.inner.next()? {
                Ok(dir_entry) => return Some(classify(&dir_entry.path())),
                Err(e) => {
                    // A child vanished or is unreadable mid-walk; keep going.
                    tracing::debug!(
                        dir = %self.root.display(),
                        error = %e,
                        "Skipping unreadable cache directory child"
                    );
                }
            }
        }
    }
}

/// Classify a single cache directory child by name and metadata
#[must_use]
pub fn classify(path: &Path) -> Candidate {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Candidate::Foreign {
            path: path.to_path_buf(),
        };
    };

    if RESERVED_FILE_NAMES.contains(&name) {
        let size = fs::symlink_metadata(path).map_or(0, |m| m.len());
        return Candidate::Reserved {
            path: path.to_path_buf(),
            size,
        };
    }

    if !is_entry_name(name) {
        return Candidate::Foreign {
            path: path.to_path_buf(),
        };
    }

    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Candidate::Foreign {
            path: path.to_path_buf(),
        },
        Ok(metadata) => {
            // Size what the directory holds: a live link costs its own bytes,
            // not its target's, since deleting it frees only the link.
            let size = fs::symlink_metadata(path).map_or(metadata.len(), |m| m.len());
            Candidate::Entry(CatalogEntry {
                name: name.to_string(),
                path: path.to_path_buf(),
                size,
                last_modified: modified_time(&metadata),
            })
        }
        Err(e) => {
            // Broken link: date it by the link itself, not its target.
            let last_modified = fs::symlink_metadata(path)
                .map_or(DateTime::<Utc>::from(SystemTime::UNIX_EPOCH), |m| {
                    modified_time(&m)
                });
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Cache entry metadata unreadable"
            );
            Candidate::Unreadable(CatalogEntry {
                name: name.to_string(),
                path: path.to_path_buf(),
                size: 0,
                last_modified,
            })
        }
    }
}

fn modified_time(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map_or(DateTime::<Utc>::from(SystemTime::UNIX_EPOCH), DateTime::<Utc>::from)
}
