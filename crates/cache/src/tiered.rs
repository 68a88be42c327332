//! Local + remote tiering
//!
//! Lookups try the local tier first. A remote hit is copied into the local
//! tier (unless writeback is disabled) so the next lookup stays local.

use crate::backend::{CacheBackend, CacheStats};
use crate::BackendResult;
use tidycache_core::Digest;

/// Two-level cache over an optional local and an optional remote backend.
pub struct TieredCache {
    local: Option<Box<dyn CacheBackend>>,
    remote: Option<Box<dyn CacheBackend>>,
    writeback: bool,
}

impl TieredCache {
    /// Tiered cache with writeback enabled
    #[must_use]
    pub fn new(
        local: Option<Box<dyn CacheBackend>>,
        remote: Option<Box<dyn CacheBackend>>,
    ) -> Self {
        Self {
            local,
            remote,
            writeback: true,
        }
    }

    /// Enable or disable copying remote hits into the local tier
    #[must_use]
    pub const fn with_writeback(mut self, writeback: bool) -> Self {
        self.writeback = writeback;
        self
    }

    /// Whether a local tier is configured
    #[must_use]
    pub const fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Whether a remote tier is configured
    #[must_use]
    pub const fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn write_back(&self, digest: &Digest, data: &[u8]) {
        if !self.writeback {
            return;
        }
        if let Some(local) = &self.local {
            match local.store_with_data(digest, data) {
                Ok(()) => tracing::debug!(digest = %digest, "Copied remote hit to local cache"),
                Err(e) => {
                    tracing::warn!(digest = %digest, error = %e, "Failed to copy remote hit locally");
                }
            }
        }
    }

    fn tiers(&self) -> impl Iterator<Item = &dyn CacheBackend> {
        self.local
            .iter()
            .chain(self.remote.iter())
            .map(|tier| &**tier)
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("local", &self.local.as_ref().map(|b| b.name()))
            .field("remote", &self.remote.as_ref().map(|b| b.name()))
            .field("writeback", &self.writeback)
            .finish()
    }
}

impl CacheBackend for TieredCache {
    fn name(&self) -> &'static str {
        "tiered"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        if self.local.as_ref().is_some_and(|local| local.is_cached(digest)) {
            return true;
        }
        if self.remote.as_ref().is_some_and(|remote| remote.is_cached(digest)) {
            self.write_back(digest, &[]);
            return true;
        }
        false
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        if let Some(data) = self.local.as_ref().and_then(|local| local.get_data(digest)) {
            return Some(data);
        }
        let data = self.remote.as_ref()?.get_data(digest)?;
        self.write_back(digest, &data);
        Some(data)
    }

    fn store(&self, digest: &Digest) -> BackendResult<()> {
        let mut first_error = None;
        for tier in self.tiers() {
            if let Err(e) = tier.store(digest) {
                tracing::warn!(backend = tier.name(), digest = %digest, error = %e, "Store failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        let mut first_error = None;
        for tier in self.tiers() {
            if let Err(e) = tier.store_with_data(digest, data) {
                tracing::warn!(backend = tier.name(), digest = %digest, error = %e, "Store failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn query_stats(&self) -> CacheStats {
        let mut stats = CacheStats::new();
        if let Some(local) = &self.local {
            stats.insert_stats("local", local.query_stats());
        }
        if let Some(remote) = &self.remote {
            stats.insert_stats("remote", remote.query_stats());
        }
        stats
    }

    fn clear_stats(&self) -> BackendResult<()> {
        let mut first_error = None;
        for tier in self.tiers() {
            if let Err(e) = tier.clear_stats() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
