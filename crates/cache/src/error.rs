//! Error types for the build cache

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

use crate::config::MIN_TARGET_SIZE_MB;

/// Error type for build cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(buildcache::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// Configured target size is below the minimum viable budget
    #[error(
        "Build cache targetSizeInMB must be at least {} MB, got {configured}",
        MIN_TARGET_SIZE_MB
    )]
    #[diagnostic(
        code(buildcache::config::target_size),
        help("Set targetSizeInMB to 1 or more")
    )]
    InvalidTargetSize {
        /// The rejected value, in megabytes
        configured: i64,
    },

    /// Configuration or validation error
    #[error("Build cache configuration error: {message}")]
    #[diagnostic(code(buildcache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The cache directory could not be listed
    #[error("Failed to scan build cache directory {}", path.display())]
    #[diagnostic(
        code(buildcache::scan),
        help("The cleanup pass is skipped and retried on the next build")
    )]
    ScanFailed {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Cache directory that could not be listed
        path: Box<Path>,
    },

    /// A string is not a valid cache key
    #[error("Invalid cache key {key:?}: {reason}")]
    #[diagnostic(code(buildcache::key))]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    #[diagnostic(
        code(buildcache::not_found),
        help("The cache entry may have been evicted or never existed")
    )]
    NotFound {
        /// The cache key that was not found
        key: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(buildcache::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a scan failure for the given cache directory
    #[must_use]
    pub fn scan_failed(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::ScanFailed {
            source,
            path: path.as_ref().into(),
        }
    }

    /// Create an invalid key error
    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }
}

/// Result type for build cache operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_size_mentions_minimum() {
        let err = Error::InvalidTargetSize { configured: 0 };
        let msg = err.to_string();
        assert!(msg.contains("at least 1 MB"), "unexpected message: {msg}");
        assert!(msg.contains("got 0"));
    }

    #[test]
    fn test_io_error_display_with_path() {
        let err = Error::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            "/tmp/cache/abc",
            "remove_file",
        );
        assert_eq!(err.to_string(), "I/O remove_file failed: /tmp/cache/abc");
    }

    #[test]
    fn test_scan_failed_display() {
        let err = Error::scan_failed(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "/var/cache/build",
        );
        assert!(err.to_string().contains("/var/cache/build"));
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = Error::InvalidTargetSize { configured: -1 };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("buildcache::config::target_size"));
    }
}
