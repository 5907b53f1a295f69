//! Local build cache configuration
//!
//! The only setting the cleanup engine depends on is `targetSizeInMB`. It is
//! validated when the configuration is turned into a [`RetentionTarget`], which
//! happens before a [`LocalCache`](crate::LocalCache) can be opened, so a bad
//! value fails the build before any task runs and before the cache directory is
//! touched.

use crate::{Error, Result};
use chrono::Duration;
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bytes per megabyte
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Smallest accepted `targetSizeInMB`
pub const MIN_TARGET_SIZE_MB: i64 = 1;

/// Default `targetSizeInMB` (5 GB)
pub const DEFAULT_TARGET_SIZE_MB: i64 = 5 * 1024;

/// Default number of days between cleanup evaluations
pub const DEFAULT_CLEANUP_INTERVAL_DAYS: i64 = 7;

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "BUILDCACHE_DIR";

/// Local build cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Whether the local cache is used at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Explicit cache directory; resolved from the environment when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Maximum size of the cache directory in megabytes
    #[serde(rename = "targetSizeInMB", default = "default_target_size_mb")]
    pub target_size_in_mb: i64,

    /// Days between cleanup evaluations
    #[serde(default = "default_cleanup_interval_days")]
    pub cleanup_interval_days: i64,
}

fn default_enabled() -> bool {
    true
}

fn default_target_size_mb() -> i64 {
    DEFAULT_TARGET_SIZE_MB
}

fn default_cleanup_interval_days() -> i64 {
    DEFAULT_CLEANUP_INTERVAL_DAYS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: None,
            target_size_in_mb: default_target_size_mb(),
            cleanup_interval_days: default_cleanup_interval_days(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a `.json` or `.toml` file
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any value
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                Error::serialization(format!("Failed to parse {}: {e}", path.display()))
            })?,
            Some("toml") => toml::from_str(&content).map_err(|e| {
                Error::serialization(format!("Failed to parse {}: {e}", path.display()))
            })?,
            _ => {
                return Err(Error::configuration(format!(
                    "Unsupported config format: {}",
                    path.display()
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every value without touching the filesystem
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTargetSize`] when `targetSizeInMB` is below
    /// [`MIN_TARGET_SIZE_MB`], or a configuration error for a non-positive
    /// cleanup interval.
    pub fn validate(&self) -> Result<()> {
        self.retention_target()?;
        self.cleanup_interval()?;
        Ok(())
    }

    /// Validated byte budget
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTargetSize`] when `targetSizeInMB` is too small.
    pub fn retention_target(&self) -> Result<RetentionTarget> {
        RetentionTarget::from_megabytes(self.target_size_in_mb)
    }

    /// Validated interval between cleanup evaluations
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the interval is less than one day
    /// or too large to represent.
    pub fn cleanup_interval(&self) -> Result<Duration> {
        let invalid = || {
            Error::configuration(format!(
                "cleanupIntervalDays must be between 1 and {}, got {}",
                Duration::MAX.num_days(),
                self.cleanup_interval_days
            ))
        };
        if self.cleanup_interval_days < 1 {
            return Err(invalid());
        }
        Duration::try_days(self.cleanup_interval_days).ok_or_else(invalid)
    }
}

/// A validated cache size budget
///
/// Can only be built from a value of at least [`MIN_TARGET_SIZE_MB`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetentionTarget {
    bytes: u64,
}

impl RetentionTarget {
    /// Validate a configured megabyte count and convert it to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTargetSize`] for zero, negative, or otherwise
    /// sub-minimum values.
    pub fn from_megabytes(target_size_in_mb: i64) -> Result<Self> {
        validate_target_size(target_size_in_mb)?;
        let mb = u64::try_from(target_size_in_mb).map_err(|_| Error::InvalidTargetSize {
            configured: target_size_in_mb,
        })?;
        Ok(Self {
            bytes: mb.saturating_mul(BYTES_PER_MB),
        })
    }

    /// Budget in bytes
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.bytes
    }

    /// Budget in whole megabytes
    #[must_use]
    pub const fn megabytes(self) -> u64 {
        self.bytes / BYTES_PER_MB
    }
}

/// Reject a `targetSizeInMB` below the minimum viable budget
///
/// # Errors
///
/// Returns [`Error::InvalidTargetSize`] naming the 1 MB minimum.
pub fn validate_target_size(target_size_in_mb: i64) -> Result<()> {
    if target_size_in_mb < MIN_TARGET_SIZE_MB {
        return Err(Error::InvalidTargetSize {
            configured: target_size_in_mb,
        });
    }
    Ok(())
}

/// Inputs for determining the cache directory
#[derive(Debug, Clone)]
struct CacheDirInputs {
    explicit: Option<PathBuf>,
    env_override: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn cache_dir_from_inputs(inputs: CacheDirInputs) -> Result<PathBuf> {
    // Resolution order (first writable wins):
    // 1) configured directory
    // 2) BUILDCACHE_DIR
    // 3) XDG_CACHE_HOME/buildcache
    // 4) OS cache dir/buildcache
    // 5) ~/.buildcache
    // 6) TMPDIR/buildcache
    // (path, source) where source names a user setting, if any
    let mut candidates: Vec<(PathBuf, Option<&str>)> = Vec::new();

    if let Some(dir) = inputs.explicit.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push((dir, Some("directory")));
    }
    if let Some(dir) = inputs.env_override.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push((dir, Some(CACHE_DIR_ENV)));
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push((xdg.join("buildcache"), None));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push((os_cache.join("buildcache"), None));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push((home.join(".buildcache"), None));
    }
    candidates.push((inputs.temp_dir.join("buildcache"), None));

    for (path, setting) in candidates {
        match probe_writable(&path) {
            Ok(()) => return Ok(path),
            Err(e) => {
                if let Some(setting) = setting {
                    tracing::warn!(
                        setting,
                        path = %path.display(),
                        error = %e,
                        "Configured build cache directory is not writable, falling back"
                    );
                }
            }
        }
    }
    Err(Error::configuration(
        "Failed to determine a writable build cache directory",
    ))
}

fn probe_writable(path: &Path) -> std::io::Result<()> {
    // Existing directories may be read-only in CI; probe before accepting.
    if path.exists() {
        let probe = path.join(".write_probe");
        fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&probe)?;
        let _ = fs::remove_file(&probe);
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Resolve the cache directory for a configuration
///
/// # Errors
///
/// Returns a configuration error when no candidate directory is writable.
pub fn resolve_cache_dir(config: &CacheConfig) -> Result<PathBuf> {
    let env_path = |name: &str| {
        std::env::var(name)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    };
    cache_dir_from_inputs(CacheDirInputs {
        explicit: config.directory.clone(),
        env_override: env_path(CACHE_DIR_ENV),
        xdg_cache_home: env_path("XDG_CACHE_HOME"),
        os_cache_dir: cache_dir(),
        home_dir: home_dir(),
        temp_dir: std::env::temp_dir(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn empty_inputs(temp_dir: PathBuf) -> CacheDirInputs {
        CacheDirInputs {
            explicit: None,
            env_override: None,
            xdg_cache_home: None,
            os_cache_dir: None,
            home_dir: None,
            temp_dir,
        }
    }

    #[test]
    fn test_target_size_zero_rejected() {
        let err = RetentionTarget::from_megabytes(0).unwrap_err();
        assert!(matches!(err, Error::InvalidTargetSize { configured: 0 }));
        assert!(err.to_string().contains("1 MB"));
    }

    #[test]
    fn test_target_size_negative_rejected() {
        let err = RetentionTarget::from_megabytes(-1).unwrap_err();
        assert!(matches!(err, Error::InvalidTargetSize { configured: -1 }));
    }

    #[test]
    fn test_target_size_minimum_accepted() {
        let target = RetentionTarget::from_megabytes(1).unwrap();
        assert_eq!(target.bytes(), BYTES_PER_MB);
        assert_eq!(target.megabytes(), 1);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retention_target().unwrap().megabytes(), 5 * 1024);
        assert_eq!(config.cleanup_interval().unwrap(), Duration::days(7));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = CacheConfig {
            cleanup_interval_days: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::Configuration { .. }
        ));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"targetSizeInMB": 42, "enabled": false}"#).unwrap();
        assert_eq!(config.target_size_in_mb, 42);
        assert!(!config.enabled);
        assert_eq!(config.cleanup_interval_days, DEFAULT_CLEANUP_INTERVAL_DAYS);
    }

    #[test]
    fn test_from_file_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.toml");
        fs::write(&path, "targetSizeInMB = 10\ncleanupIntervalDays = 3\n").unwrap();

        let config = CacheConfig::from_file(&path).unwrap();
        assert_eq!(config.target_size_in_mb, 10);
        assert_eq!(config.cleanup_interval_days, 3);
    }

    #[test]
    fn test_from_file_rejects_invalid_target() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        fs::write(&path, r#"{"targetSizeInMB": 0}"#).unwrap();

        let err = CacheConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidTargetSize { configured: 0 }));
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.ini");
        fs::write(&path, "targetSizeInMB=10").unwrap();
        assert!(CacheConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_explicit_dir_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("explicit");
        let inputs = CacheDirInputs {
            explicit: Some(explicit.clone()),
            env_override: Some(tmp.path().join("env")),
            ..empty_inputs(tmp.path().to_path_buf())
        };
        assert_eq!(cache_dir_from_inputs(inputs).unwrap(), explicit);
        assert!(explicit.is_dir());
    }

    #[test]
    fn test_env_override_before_xdg() {
        let tmp = TempDir::new().unwrap();
        let inputs = CacheDirInputs {
            env_override: Some(tmp.path().join("env")),
            xdg_cache_home: Some(tmp.path().join("xdg")),
            ..empty_inputs(tmp.path().to_path_buf())
        };
        assert_eq!(cache_dir_from_inputs(inputs).unwrap(), tmp.path().join("env"));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unwritable_explicit_dir_warns_and_falls_back() {
        let tmp = TempDir::new().unwrap();
        // A path below a regular file can never be created.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let explicit = blocker.join("cache");
        let inputs = CacheDirInputs {
            explicit: Some(explicit.clone()),
            ..empty_inputs(tmp.path().to_path_buf())
        };

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let resolved = tracing::subscriber::with_default(subscriber, || {
            cache_dir_from_inputs(inputs).unwrap()
        });

        assert_eq!(resolved, tmp.path().join("buildcache"));
        let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).to_string();
        assert!(output.contains("not writable"), "{output}");
        assert!(output.contains(&explicit.display().to_string()), "{output}");
    }

    #[test]
    fn test_unwritable_fallback_dirs_do_not_warn() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let inputs = CacheDirInputs {
            xdg_cache_home: Some(blocker),
            ..empty_inputs(tmp.path().to_path_buf())
        };

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let resolved = tracing::subscriber::with_default(subscriber, || {
            cache_dir_from_inputs(inputs).unwrap()
        });

        assert_eq!(resolved, tmp.path().join("buildcache"));
        assert!(logs.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_falls_back_to_temp_dir() {
        let tmp = TempDir::new().unwrap();
        let resolved = cache_dir_from_inputs(empty_inputs(tmp.path().to_path_buf())).unwrap();
        assert_eq!(resolved, tmp.path().join("buildcache"));
    }
}
