//! Network cache backends for tidycache
//!
//! - [`RestBackend`]: a shared HTTP cache service
//! - [`RedisBackend`]: a Redis server, optionally with entry TTLs
//!
//! Both degrade to cache misses when the remote end is unreachable.

pub mod kv;
pub mod rest;

pub use kv::RedisBackend;
pub use rest::RestBackend;
