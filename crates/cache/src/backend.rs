//! Cache Backend Abstraction
//!
//! Every storage variant, and every wrapper around them (composite, stats
//! decorator, tiered cache), implements [`CacheBackend`], so wrappers nest
//! without special cases.
//!
//! Lookups never fail: transient trouble (timeouts, refused connections,
//! missing entries) is logged by the backend and reported as a miss. Writes
//! return a [`BackendResult`] and silently succeed on read-only backends.

use crate::BackendResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tidycache_core::Digest;

/// Statistics reported by a backend, as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheStats(Map<String, Value>);

impl CacheStats {
    /// Empty stats object
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; anything other than an object yields `None`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set a nested stats object
    pub fn insert_stats(&mut self, key: impl Into<String>, stats: Self) {
        self.0.insert(key.into(), Value::Object(stats.0));
    }

    /// Field by name
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Integer field by name
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// Numeric field by name
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Nested stats object by name
    #[must_use]
    pub fn get_stats(&self, key: &str) -> Option<Self> {
        self.get(key).cloned().and_then(Self::from_value)
    }

    /// Copy all fields of `other` into `self`, overwriting duplicates.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Convert into a JSON value
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Cache backend trait for pluggable cache implementations
///
/// Calls are synchronous; implementations must be thread-safe (`Send + Sync`).
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Whether an entry exists for `digest`.
    fn is_cached(&self, digest: &Digest) -> bool;

    /// Stored payload for `digest`, `None` on a miss.
    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>>;

    /// Store an empty marker entry.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails; callers log and continue.
    fn store(&self, digest: &Digest) -> BackendResult<()> {
        self.store_with_data(digest, &[])
    }

    /// Store `data` under `digest`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails; callers log and continue.
    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()>;

    /// Backend statistics; empty when the backend keeps none.
    fn query_stats(&self) -> CacheStats;

    /// Reset statistics.
    ///
    /// # Errors
    ///
    /// Returns error if counters could not be removed.
    fn clear_stats(&self) -> BackendResult<()>;
}

impl<T: CacheBackend + ?Sized> CacheBackend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        (**self).is_cached(digest)
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        (**self).get_data(digest)
    }

    fn store(&self, digest: &Digest) -> BackendResult<()> {
        (**self).store(digest)
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        (**self).store_with_data(digest, data)
    }

    fn query_stats(&self) -> CacheStats {
        (**self).query_stats()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        (**self).clear_stats()
    }
}

impl<T: CacheBackend + ?Sized> CacheBackend for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        (**self).is_cached(digest)
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        (**self).get_data(digest)
    }

    fn store(&self, digest: &Digest) -> BackendResult<()> {
        (**self).store(digest)
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        (**self).store_with_data(digest, data)
    }

    fn query_stats(&self) -> CacheStats {
        (**self).query_stats()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        (**self).clear_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_fields() {
        let mut stats = CacheStats::new();
        assert!(stats.is_empty());
        stats.insert("cached_count", 3u64);
        stats.insert("hit_rate", 0.5);
        assert_eq!(stats.get_u64("cached_count"), Some(3));
        assert_eq!(stats.get_f64("hit_rate"), Some(0.5));
        assert_eq!(stats.get_u64("missing"), None);
    }

    #[test]
    fn test_stats_from_value() {
        assert!(CacheStats::from_value(json!([1, 2])).is_none());
        let stats = CacheStats::from_value(json!({"total_hit_count": 7})).unwrap();
        assert_eq!(stats.get_u64("total_hit_count"), Some(7));
    }

    #[test]
    fn test_stats_merge_and_nesting() {
        let mut local = CacheStats::new();
        local.insert("cached_count", 1u64);
        let mut extra = CacheStats::new();
        extra.insert("hit_count", 2u64);
        local.merge(extra);

        let mut top = CacheStats::new();
        top.insert_stats("local", local);
        let nested = top.get_stats("local").unwrap();
        assert_eq!(nested.get_u64("cached_count"), Some(1));
        assert_eq!(nested.get_u64("hit_count"), Some(2));
        assert_eq!(
            top.into_value(),
            json!({"local": {"cached_count": 1, "hit_count": 2}})
        );
    }

    #[test]
    fn test_stats_serialize_as_plain_object() {
        let mut stats = CacheStats::new();
        stats.insert("hit_count", 1u64);
        assert_eq!(serde_json::to_string(&stats).unwrap(), r#"{"hit_count":1}"#);
    }
}
