//! In-memory backend for unit tests

use crate::backend::{CacheBackend, CacheStats};
use crate::{BackendError, BackendResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tidycache_core::Digest;

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<Digest, Vec<u8>>>,
    pub lookups: AtomicUsize,
    pub stores: AtomicUsize,
    pub stats_cleared: AtomicUsize,
    fail_writes: bool,
    stats: CacheStats,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn with_entry(self, digest: &Digest, data: &[u8]) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(digest.clone(), data.to_vec());
        self
    }

    pub fn with_stats(mut self, stats: CacheStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.lock().unwrap().contains_key(digest)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.contains(digest)
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().get(digest).cloned()
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(BackendError::Unavailable("memory backend is failing".into()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(digest.clone(), data.to_vec());
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        self.stats_cleared.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(BackendError::Unavailable("memory backend is failing".into()));
        }
        Ok(())
    }
}

pub fn digest(seed: &str) -> Digest {
    use sha2::{Digest as _, Sha256};
    Digest::parse(&hex::encode(Sha256::digest(seed.as_bytes()))).unwrap()
}
