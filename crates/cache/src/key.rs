//! Cache entry identifiers
//!
//! Entries are named by a fixed-width hexadecimal content address. The core
//! never interprets the digest; it only needs to recognise which directory
//! children look like entries.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in an entry name
pub const KEY_HEX_LEN: usize = 32;

/// A cache entry identifier (fixed-width hex string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from arbitrary bytes
    ///
    /// Uses the first 16 bytes of a SHA-256 digest. Callers that compute their
    /// own keys should use [`CacheKey::from_hex`] instead.
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(&digest[..KEY_HEX_LEN / 2]))
    }

    /// Parse a key from its hex representation
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the string has the wrong length or
    /// contains non-hex characters.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let s = hex.into();
        if s.len() != KEY_HEX_LEN {
            return Err(Error::invalid_key(
                s.clone(),
                format!("expected {KEY_HEX_LEN} hex characters, got {}", s.len()),
            ));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_key(s, "contains non-hex characters"));
        }
        Ok(Self(s))
    }

    /// Get the hex representation
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Whether a directory child name matches the entry-name pattern
#[must_use]
pub fn is_entry_name(name: &str) -> bool {
    name.len() == KEY_HEX_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}
