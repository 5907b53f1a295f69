//! Local directory build cache
//!
//! The store side of the cache: entries are single files named by their
//! [`CacheKey`] directly under the cache root. Writes go to a temporary name and
//! are renamed into place only once complete, so cleanup never sees a partial
//! entry. Reads refresh the entry's mtime, which is the recency signal the
//! retention policy sorts on.

use crate::catalog::{MARKER_FILE_NAME, PROPERTIES_FILE_NAME};
use crate::cleanup::{CleanupExecutor, CleanupOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, resolve_cache_dir};
use crate::key::{CacheKey, KEY_HEX_LEN};
use crate::trigger::TriggerGate;
use crate::{Error, Result};
use filetime::FileTime;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Layout version written to the properties file
pub const LAYOUT_VERSION: u32 = 1;

/// A local, filesystem-backed build cache
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    cleanup: CleanupExecutor,
}

impl LocalCache {
    /// Open the cache described by `config`, resolving its directory
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidTargetSize`] before touching the filesystem
    /// when the configured budget is too small, or with an I/O or
    /// configuration error if the directory cannot be prepared.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let root = resolve_cache_dir(config)?;
        Self::open_at(root, config, Arc::new(SystemClock))
    }

    /// Open the cache only when it is enabled
    ///
    /// # Errors
    ///
    /// Same as [`LocalCache::open`]; a disabled cache is still validated.
    pub fn open_if_enabled(config: &CacheConfig) -> Result<Option<Self>> {
        config.validate()?;
        if !config.enabled {
            tracing::debug!("Local build cache disabled");
            return Ok(None);
        }
        Self::open(config).map(Some)
    }

    /// Open a cache at an explicit directory with an explicit clock
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid config, or an I/O error if
    /// the directory or properties file cannot be created.
    pub fn open_at(
        root: impl Into<PathBuf>,
        config: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let target = config.retention_target()?;
        let interval = config.cleanup_interval()?;
        let root = root.into();

        fs::create_dir_all(&root).map_err(|e| Error::io(e, &root, "create_dir_all"))?;
        write_properties(&root)?;

        let gate = TriggerGate::new(root.join(MARKER_FILE_NAME), interval, Arc::clone(&clock));
        let cleanup = CleanupExecutor::new(&root, target, gate);
        Ok(Self {
            root,
            clock,
            cleanup,
        })
    }

    /// Cache root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an entry is stored at
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_hex())
    }

    /// Whether an entry exists, without recording an access
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Store an entry atomically
    ///
    /// Storing an existing key replaces it with identical content and counts
    /// as a use.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary file cannot be written or renamed.
    pub fn store(&self, key: &CacheKey, data: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        // Unique per call and never matches the entry pattern, so concurrent
        // writers don't share a file and cleanup treats it as foreign.
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", key.as_hex()))
            .suffix(".part")
            .tempfile_in(&self.root)
            .map_err(|e| Error::io(e, &self.root, "create_temp"))?;

        tmp.write_all(data)
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(e, tmp.path(), "sync"))?;

        // A failed persist drops the temp file, which removes it.
        tmp.persist(&path)
            .map_err(|e| Error::io(e.error, &path, "rename"))?;
        self.stamp(&path)?;

        tracing::debug!(key = %key, size = data.len(), "Stored build cache entry");
        Ok(())
    }

    /// Load an entry, recording the access
    ///
    /// Returns `Ok(None)` on a miss, including an entry that was evicted
    /// between lookup and read.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for failures other than a missing entry.
    pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(e, &path, "read")),
        };
        self.record_access(key)?;
        Ok(Some(data))
    }

    /// Load an entry that must exist
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] on a miss.
    pub fn load_required(&self, key: &CacheKey) -> Result<Vec<u8>> {
        self.load(key)?.ok_or_else(|| Error::not_found(key.as_hex()))
    }

    /// Mark an entry as just used so it sorts newest for eviction
    ///
    /// Returns `false` if the entry does not exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the timestamp cannot be updated.
    pub fn record_access(&self, key: &CacheKey) -> Result<bool> {
        let path = self.entry_path(key);
        match self.stamp(&path) {
            Ok(()) => Ok(true),
            Err(Error::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run the cleanup pass if it is due; call once per build
    #[must_use]
    pub fn run_cleanup_if_due(&self) -> CleanupOutcome {
        self.cleanup.run_if_due()
    }

    /// Cleanup executor for this cache
    #[must_use]
    pub const fn cleanup(&self) -> &CleanupExecutor {
        &self.cleanup
    }

    fn stamp(&self, path: &Path) -> Result<()> {
        let now = FileTime::from_system_time(SystemTime::from(self.clock.now()));
        filetime::set_file_mtime(path, now).map_err(|e| Error::io(e, path, "set_mtime"))
    }
}

fn write_properties(root: &Path) -> Result<()> {
    let path = root.join(PROPERTIES_FILE_NAME);
    if path.exists() {
        return Ok(());
    }
    let content = format!("layout={LAYOUT_VERSION}\nkey-length={KEY_HEX_LEN}\n");
    fs::write(&path, content).map_err(|e| Error::io(e, &path, "write"))
}
