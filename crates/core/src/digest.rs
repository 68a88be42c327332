//! Cache keys
//!
//! A [`Digest`] is the lowercase hex SHA-256 of everything that influences a
//! tool run. The first [`SHARD_LEN`] characters select a shard directory and
//! stats file; the remaining [`SUFFIX_LEN`] characters name the entry inside it.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in a digest (SHA-256).
pub const DIGEST_HEX_LEN: usize = 64;

/// Number of leading hex characters used as the shard prefix.
pub const SHARD_LEN: usize = 2;

/// Number of hex characters left after the shard prefix.
pub const SUFFIX_LEN: usize = DIGEST_HEX_LEN - SHARD_LEN;

/// Number of shards (one per leading byte value).
pub const SHARD_COUNT: usize = 256;

/// Regex matching the on-disk name of a local cache entry.
pub const ENTRY_FILENAME_PATTERN: &str = "^[0-9a-f]{62}$";

/// Validated cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Parse a digest from its hex representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] unless `value` is exactly
    /// [`DIGEST_HEX_LEN`] lowercase hex characters.
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != DIGEST_HEX_LEN {
            return Err(Error::InvalidDigest {
                value: value.to_string(),
                message: format!("expected {DIGEST_HEX_LEN} characters, got {}", value.len()),
            });
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(Error::InvalidDigest {
                value: value.to_string(),
                message: "expected lowercase hexadecimal".to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Build a digest from raw hash output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigest`] if `bytes` is not 32 bytes long.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        Self::parse(&hex::encode(bytes))
    }

    /// Wrap hex produced by a SHA-256 hasher, which always has the right shape.
    pub(crate) const fn from_sha256_hex(hex: String) -> Self {
        Self(hex)
    }

    /// Full hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shard prefix, e.g. `"3f"`.
    #[must_use]
    pub fn shard(&self) -> &str {
        &self.0[..SHARD_LEN]
    }

    /// Everything after the shard prefix.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.0[SHARD_LEN..]
    }

    /// Shard as an index in `0..SHARD_COUNT`.
    #[must_use]
    pub fn shard_index(&self) -> usize {
        usize::from_str_radix(self.shard(), 16).unwrap_or(0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shard name for an index, zero-padded to two hex digits.
#[must_use]
pub fn shard_name(index: usize) -> String {
    format!("{index:02x}")
}
