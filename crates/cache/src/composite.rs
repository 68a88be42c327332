//! Fan-out over several backends
//!
//! Lookups return the first backend that has the entry; stores go to every
//! backend and a failing one does not stop the rest.

use crate::backend::{CacheBackend, CacheStats};
use crate::BackendResult;
use tidycache_core::Digest;

/// Ordered list of backends acting as one.
#[derive(Default)]
pub struct CompositeBackend {
    backends: Vec<Box<dyn CacheBackend>>,
}

impl CompositeBackend {
    /// Composite over `backends`, queried in order
    #[must_use]
    pub fn new(backends: Vec<Box<dyn CacheBackend>>) -> Self {
        Self { backends }
    }

    /// Append a backend
    pub fn push(&mut self, backend: Box<dyn CacheBackend>) {
        self.backends.push(backend);
    }

    /// Number of wrapped backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is wrapped
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Unwrap a single-backend composite
    #[must_use]
    pub fn into_single(mut self) -> Result<Box<dyn CacheBackend>, Self> {
        if self.backends.len() == 1
            && let Some(backend) = self.backends.pop()
        {
            return Ok(backend);
        }
        Err(self)
    }

    fn broadcast<F>(&self, operation: &'static str, digest: &Digest, write: F)
    where
        F: Fn(&dyn CacheBackend) -> BackendResult<()>,
    {
        for backend in &self.backends {
            if let Err(e) = write(&**backend) {
                tracing::warn!(
                    backend = backend.name(),
                    digest = %digest,
                    operation,
                    error = %e,
                    "Backend write failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for CompositeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("CompositeBackend")
            .field("backends", &names)
            .finish()
    }
}

impl CacheBackend for CompositeBackend {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        self.backends.iter().any(|backend| backend.is_cached(digest))
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        self.backends
            .iter()
            .find_map(|backend| backend.get_data(digest))
    }

    fn store(&self, digest: &Digest) -> BackendResult<()> {
        self.broadcast("store", digest, |backend| backend.store(digest));
        Ok(())
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        self.broadcast("store_with_data", digest, |backend| {
            backend.store_with_data(digest, data)
        });
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        self.backends
            .iter()
            .map(|backend| backend.query_stats())
            .find(|stats| !stats.is_empty())
            .unwrap_or_default()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        for backend in &self.backends {
            if let Err(e) = backend.clear_stats() {
                tracing::warn!(backend = backend.name(), error = %e, "Failed to clear stats");
            }
        }
        Ok(())
    }
}
