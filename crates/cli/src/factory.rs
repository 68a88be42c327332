//! Cache construction from [`Settings`]
//!
//! Remote backends are tried in a fixed order (REST, Redis, S3, GCS). One that
//! fails to construct is logged and left out; the run continues with the
//! rest.

use tidycache_cache::{
    BackendResult, CacheBackend, CompositeBackend, LOCAL_STATS, LocalBackend, REMOTE_STATS,
    ShardedCounters, StatsBackend, TieredCache,
};
use tidycache_core::Settings;
use tidycache_remote::{RedisBackend, RestBackend};

/// Build the tiered cache described by `settings`.
#[must_use]
pub fn build_cache(settings: &Settings) -> TieredCache {
    let local = settings.use_local().then(|| local_tier(settings));
    let remote = remote_tier(settings);

    tracing::debug!(
        cache_dir = %settings.cache_dir.display(),
        local = local.is_some(),
        remote = remote.as_ref().map(|r| r.name()),
        "Cache configured"
    );

    TieredCache::new(local, remote).with_writeback(!settings.local.no_writeback)
}

/// Every configured remote backend that could be constructed, in lookup order.
#[must_use]
pub fn remote_backends(settings: &Settings) -> Vec<Box<dyn CacheBackend>> {
    let mut backends = Vec::new();

    if let Some(rest) = &settings.rest {
        push(&mut backends, "rest", RestBackend::new(rest));
    }
    if let Some(redis) = &settings.redis {
        push(&mut backends, "redis", RedisBackend::new(redis));
    }
    if let Some(s3) = &settings.s3 {
        #[cfg(feature = "s3")]
        push(&mut backends, "s3", tidycache_aws::S3Backend::new(s3));
        #[cfg(not(feature = "s3"))]
        tracing::warn!(bucket = %s3.bucket, "S3 support is not compiled in; ignoring CTCACHE_S3_BUCKET");
    }
    if let Some(gcs) = &settings.gcs {
        #[cfg(feature = "gcs")]
        push(&mut backends, "gcs", tidycache_gcp::GcsBackend::new(gcs));
        #[cfg(not(feature = "gcs"))]
        tracing::warn!(bucket = %gcs.bucket, "GCS support is not compiled in; ignoring CTCACHE_GCS_BUCKET");
    }

    backends
}

fn push<B>(backends: &mut Vec<Box<dyn CacheBackend>>, kind: &'static str, result: BackendResult<B>)
where
    B: CacheBackend + 'static,
{
    match result {
        Ok(backend) => backends.push(Box::new(backend)),
        Err(e) => tracing::warn!(backend = kind, error = %e, "Skipping remote cache"),
    }
}

fn local_tier(settings: &Settings) -> Box<dyn CacheBackend> {
    with_stats(LocalBackend::new(&settings.cache_dir), settings, LOCAL_STATS)
}

fn remote_tier(settings: &Settings) -> Option<Box<dyn CacheBackend>> {
    let backends = remote_backends(settings);
    if backends.is_empty() {
        return None;
    }
    let remote = match CompositeBackend::new(backends).into_single() {
        Ok(single) => single,
        Err(composite) => Box::new(composite),
    };
    Some(with_stats(remote, settings, REMOTE_STATS))
}

fn with_stats<B>(backend: B, settings: &Settings, kind: &'static str) -> Box<dyn CacheBackend>
where
    B: CacheBackend + 'static,
{
    if settings.local.no_stats {
        Box::new(backend)
    } else {
        let counters = ShardedCounters::new(&settings.cache_dir, kind);
        Box::new(StatsBackend::new(backend, counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn settings(tmp: &TempDir, vars: &[(&str, &str)]) -> Settings {
        let mut map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        map.insert(
            "CTCACHE_DIR".to_string(),
            tmp.path().to_string_lossy().into_owned(),
        );
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_local_only_without_remotes() {
        let tmp = TempDir::new().unwrap();
        let cache = build_cache(&settings(&tmp, &[]));
        assert!(cache.has_local());
        assert!(!cache.has_remote());
    }

    #[test]
    fn test_remote_replaces_local() {
        let tmp = TempDir::new().unwrap();
        let cache = build_cache(&settings(&tmp, &[("CTCACHE_HOST", "127.0.0.1")]));
        assert!(!cache.has_local());
        assert!(cache.has_remote());
    }

    #[test]
    fn test_force_local_keeps_both_tiers() {
        let tmp = TempDir::new().unwrap();
        let cache = build_cache(&settings(
            &tmp,
            &[("CTCACHE_HOST", "127.0.0.1"), ("CTCACHE_LOCAL", "1")],
        ));
        assert!(cache.has_local());
        assert!(cache.has_remote());
    }

    #[test]
    fn test_remote_order() {
        let tmp = TempDir::new().unwrap();
        let backends = remote_backends(&settings(
            &tmp,
            &[
                ("CTCACHE_GCS_BUCKET", "bucket"),
                ("CTCACHE_GCS_ACCESS_TOKEN", "token"),
                ("CTCACHE_REDIS_HOST", "127.0.0.1"),
                ("CTCACHE_HOST", "127.0.0.1"),
            ],
        ));
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        if cfg!(feature = "gcs") {
            assert_eq!(names, ["rest", "redis", "gcs"]);
        } else {
            assert_eq!(names, ["rest", "redis"]);
        }
    }

    #[test]
    fn test_unconstructible_remote_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let backends = remote_backends(&settings(
            &tmp,
            &[
                ("CTCACHE_HOST", "127.0.0.1"),
                ("CTCACHE_GCS_BUCKET", "bucket"),
                ("CTCACHE_GCS_ENDPOINT", "not a url"),
            ],
        ));
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        assert_eq!(names, ["rest"]);
    }

    #[test]
    fn test_stats_decorate_local_tier() {
        let tmp = TempDir::new().unwrap();
        let cache = build_cache(&settings(&tmp, &[]));
        let stats = cache.query_stats();
        let local = stats.get_stats("local").unwrap();
        assert_eq!(local.get_u64("hit_count"), Some(0));
        assert_eq!(local.get_u64("miss_count"), Some(0));
    }

    #[test]
    fn test_no_stats_skips_counters() {
        let tmp = TempDir::new().unwrap();
        let cache = build_cache(&settings(&tmp, &[("CTCACHE_NO_LOCAL_STATS", "1")]));
        let local = cache.query_stats().get_stats("local").unwrap();
        assert!(local.get("hit_count").is_none());
        assert_eq!(local.get_u64("cached_count"), Some(0));
    }
}
