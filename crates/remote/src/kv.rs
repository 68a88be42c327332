//! Redis key-value backend
//!
//! Entries are stored under `namespace + digest`. Only `AUTH`, `GET`, `SET`
//! and `EXPIRE` are sent, so a user restricted to those commands is enough.

use redis::{Client, Connection, IntoConnectionInfo};
use std::sync::{Mutex, MutexGuard};
use tidycache_cache::{BackendError, BackendResult, CacheBackend, CacheStats};
use tidycache_core::Digest;
use tidycache_core::config::RedisSettings;

/// Connection slot. `Failed` remembers a refused connect so later calls
/// don't wait out the connect timeout again.
enum Slot {
    Idle,
    Connected(Connection),
    Failed,
}

/// Backend storing entries in Redis.
pub struct RedisBackend {
    client: Client,
    settings: RedisSettings,
    connection: Mutex<Slot>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("db", &self.settings.db)
            .field("namespace", &self.settings.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Create a backend; the connection is opened on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connection`] if the connection parameters
    /// are invalid.
    pub fn new(settings: &RedisSettings) -> BackendResult<Self> {
        let mut info = (settings.host.clone(), settings.port)
            .into_connection_info()
            .map_err(|e| BackendError::Connection(format!("Invalid Redis address: {e}")))?;
        info.redis.db = settings.db;
        info.redis.username = non_empty(&settings.username);
        info.redis.password = non_empty(&settings.password);

        let client = Client::open(info)
            .map_err(|e| BackendError::Connection(format!("Invalid Redis settings: {e}")))?;

        Ok(Self {
            client,
            settings: settings.clone(),
            connection: Mutex::new(Slot::Idle),
        })
    }

    /// Redis key for `digest`
    #[must_use]
    pub fn key(&self, digest: &Digest) -> String {
        format!("{}{digest}", self.settings.namespace)
    }

    fn ttl_secs(&self) -> Option<u64> {
        self.settings.cache_ttl.map(|ttl| ttl.as_secs().max(1))
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn connect(&self) -> BackendResult<Connection> {
        let connection = self
            .client
            .get_connection_with_timeout(self.settings.connect_timeout)
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let timeout = Some(self.settings.operation_timeout);
        connection
            .set_read_timeout(timeout)
            .and_then(|()| connection.set_write_timeout(timeout))
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        Ok(connection)
    }

    /// Run `op` on the shared connection, connecting first if needed.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> redis::RedisResult<T>,
    ) -> BackendResult<T> {
        let mut slot = self.lock();
        if matches!(*slot, Slot::Failed) {
            return Err(BackendError::Unavailable(format!(
                "Redis at {}:{} is unreachable",
                self.settings.host, self.settings.port
            )));
        }
        if matches!(*slot, Slot::Idle) {
            match self.connect() {
                Ok(connection) => *slot = Slot::Connected(connection),
                Err(e) => {
                    tracing::warn!(
                        host = %self.settings.host,
                        port = self.settings.port,
                        error = %e,
                        "Redis connection failed, disabling for this run"
                    );
                    *slot = Slot::Failed;
                    return Err(e);
                }
            }
        }
        let Slot::Connected(connection) = &mut *slot else {
            return Err(BackendError::Unavailable("Redis connection missing".into()));
        };
        op(connection).map_err(|e| {
            if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() {
                *slot = Slot::Idle;
            }
            BackendError::Unavailable(e.to_string())
        })
    }

    fn fetch(&self, digest: &Digest) -> Option<Vec<u8>> {
        let key = self.key(digest);
        let result = self.with_connection(|con| {
            redis::cmd("GET")
                .arg(&key)
                .query::<Option<Vec<u8>>>(con)
        });
        match result {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Redis lookup failed");
                None
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        self.fetch(digest).is_some()
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        let data = self.fetch(digest)?;
        if !self.settings.read_only
            && let Some(ttl) = self.ttl_secs()
        {
            let key = self.key(digest);
            let refreshed = self.with_connection(|con| {
                redis::cmd("EXPIRE")
                    .arg(&key)
                    .arg(ttl)
                    .arg("XX")
                    .query::<i64>(con)
            });
            if let Err(e) = refreshed {
                tracing::debug!(key = %key, error = %e, "Failed to extend TTL");
            }
        }
        Some(data)
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        if self.settings.read_only {
            return Ok(());
        }
        let key = self.key(digest);
        let ttl = self.ttl_secs();
        self.with_connection(|con| {
            let mut cmd = redis::cmd("SET");
            cmd.arg(&key).arg(data);
            if let Some(ttl) = ttl {
                cmd.arg("EX").arg(ttl);
            }
            cmd.query::<()>(con)
        })?;
        tracing::debug!(key = %key, bytes = data.len(), "Stored entry in Redis");
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        CacheStats::new()
    }

    fn clear_stats(&self) -> BackendResult<()> {
        Ok(())
    }
}
