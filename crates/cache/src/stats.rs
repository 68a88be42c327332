//! Hit/miss accounting decorator

use crate::backend::{CacheBackend, CacheStats};
use crate::counters::ShardedCounters;
use crate::BackendResult;
use tidycache_core::Digest;

/// Wraps a backend and counts the outcome of every lookup.
///
/// Counter failures are logged and never change a lookup's result.
#[derive(Debug)]
pub struct StatsBackend<B> {
    inner: B,
    counters: ShardedCounters,
}

impl<B: CacheBackend> StatsBackend<B> {
    /// Count lookups on `inner` into `counters`
    pub const fn new(inner: B, counters: ShardedCounters) -> Self {
        Self { inner, counters }
    }

    /// Wrapped backend
    pub const fn inner(&self) -> &B {
        &self.inner
    }

    /// Counter set used by this decorator
    pub const fn counters(&self) -> &ShardedCounters {
        &self.counters
    }

    fn record(&self, digest: &Digest, hit: bool) {
        if let Err(e) = self.counters.record(digest, hit) {
            tracing::warn!(
                backend = self.inner.name(),
                kind = self.counters.kind(),
                digest = %digest,
                error = %e,
                "Failed to update stats"
            );
        }
    }
}

impl<B: CacheBackend> CacheBackend for StatsBackend<B> {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        let hit = self.inner.is_cached(digest);
        self.record(digest, hit);
        hit
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        let data = self.inner.get_data(digest);
        self.record(digest, data.is_some());
        data
    }

    fn store(&self, digest: &Digest) -> BackendResult<()> {
        self.inner.store(digest)
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        self.inner.store_with_data(digest, data)
    }

    fn query_stats(&self) -> CacheStats {
        let mut stats = self.inner.query_stats();
        match self.counters.totals() {
            Ok(counts) => {
                stats.insert("hit_count", counts.hits);
                stats.insert("miss_count", counts.misses);
                stats.insert("hit_rate", counts.hit_rate());
                stats.insert("miss_rate", counts.miss_rate());
            }
            Err(e) => {
                tracing::warn!(kind = self.counters.kind(), error = %e, "Failed to read stats");
            }
        }
        stats
    }

    fn clear_stats(&self) -> BackendResult<()> {
        let counters = self.counters.clear();
        let inner = self.inner.clear_stats();
        counters.and(inner)
    }
}
