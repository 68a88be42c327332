//! Error types for cache backends

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors for shard lock operations
#[derive(Debug, Error, Diagnostic)]
pub enum LockError {
    /// Lock acquisition timed out
    #[error("Timed out after {timeout_ms}ms waiting for lock '{}'", path.display())]
    #[diagnostic(
        code(tidycache::cache::lock_timeout),
        help("Another process may hold the lock; it is broken automatically once stale")
    )]
    Timeout {
        /// Lock file path
        path: PathBuf,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Lock file IO error
    #[error("Lock file error for '{}': {source}", path.display())]
    #[diagnostic(code(tidycache::cache::lock_io))]
    Io {
        /// Lock file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Lock is held by another process
    #[error("Lock held by process {pid} (acquired {age_secs}s ago)")]
    #[diagnostic(code(tidycache::cache::lock_held))]
    HeldByOther {
        /// Holder's process id, 0 if unknown
        pid: u32,
        /// Age of the lock
        age_secs: u64,
    },
}

/// Error types for cache backend operations
#[derive(Debug, Error, Diagnostic)]
pub enum BackendError {
    /// IO error with path context
    #[error("Failed to {operation} '{}': {source}", path.display())]
    #[diagnostic(
        code(tidycache::cache::io),
        help("Check permissions of the cache directory")
    )]
    Io {
        /// What was being done
        operation: &'static str,
        /// Path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Stats shard lock could not be taken
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lock(#[from] LockError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    #[diagnostic(code(tidycache::cache::serialization))]
    Serialization(String),

    /// Remote connection error
    #[error("Remote cache connection error: {0}")]
    #[diagnostic(code(tidycache::cache::connection))]
    Connection(String),

    /// Remote cache unavailable (gracefully degradable)
    #[error("Remote cache unavailable: {0}")]
    #[diagnostic(code(tidycache::cache::unavailable))]
    Unavailable(String),

    /// Object storage rejected a write
    ///
    /// Unlike transient failures this usually means wrong credentials or a
    /// missing bucket, so it is reported to the caller.
    #[error("Object storage {provider} write to '{key}' failed: {message}")]
    #[diagnostic(
        code(tidycache::cache::object_store),
        help("Check bucket name and credentials, or set the READ_ONLY / NO_CREDENTIALS option")
    )]
    ObjectStore {
        /// Provider name (`s3`, `gcs`)
        provider: &'static str,
        /// Object key
        key: String,
        /// Provider error text
        message: String,
    },
}

impl BackendError {
    /// Returns true if this error indicates the cache is unavailable but
    /// execution should continue without caching.
    #[must_use]
    pub const fn is_gracefully_degradable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Connection(_) | Self::Lock(_)
        )
    }

    /// Create an IO error with path context
    pub fn io_with_context(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type for cache backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;
