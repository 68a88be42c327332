//! Cache backends for tidycache
//!
//! This crate stores and looks up lint results by content digest:
//! - [`LocalBackend`]: sharded entry files under a cache root
//! - [`StatsBackend`]: per-shard hit/miss counters around any backend
//! - [`CompositeBackend`]: first-hit lookup and broadcast stores over many remotes
//! - [`TieredCache`]: local tier in front of a remote tier, with writeback
//!
//! Every backend implements [`CacheBackend`], so the layers nest freely.
//! Remote backends live in their own crates and implement the same trait.

mod backend;
pub mod composite;
pub mod counters;
mod error;
pub mod local;
pub mod lock;
pub mod stats;
pub mod tiered;

#[cfg(test)]
mod testing;

pub use backend::{CacheBackend, CacheStats};
pub use composite::CompositeBackend;
pub use counters::{Counts, LOCAL_STATS, REMOTE_STATS, ShardedCounters};
pub use error::{BackendError, BackendResult, LockError};
pub use local::{LocalBackend, remove_cache_root};
pub use lock::FileLock;
pub use stats::StatsBackend;
pub use tiered::TieredCache;
