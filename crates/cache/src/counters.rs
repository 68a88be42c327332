//! Persistent hit/miss counters
//!
//! One file per shard at `<root>/<shard>/<kind>` holding `"<hits> <misses>\n"`.
//! Updates are read-modify-write under the shard's [`FileLock`], so concurrent
//! wrapper processes sharing a cache root never lose an increment.

use crate::lock::{FileLock, lock_path_for};
use crate::{BackendError, BackendResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tidycache_core::Digest;
use tidycache_core::digest::{SHARD_COUNT, shard_name};

/// Counter file name for the local tier
pub const LOCAL_STATS: &str = "stats";

/// Counter file name for the remote tier
pub const REMOTE_STATS: &str = "remote_stats";

/// Hit and miss totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Number of lookups that found an entry
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
}

impl Counts {
    /// `hits + misses`
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of hits, 0 when nothing was looked up
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.hits as f64 / self.total() as f64
        }
    }

    /// Fraction of misses, 0 when nothing was looked up
    #[must_use]
    pub fn miss_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.misses as f64 / self.total() as f64
        }
    }

    fn parse(contents: &str) -> Option<Self> {
        let mut fields = contents.split_whitespace();
        let hits = fields.next()?.parse().ok()?;
        let misses = fields.next()?.parse().ok()?;
        Some(Self { hits, misses })
    }

    fn render(self) -> String {
        format!("{} {}\n", self.hits, self.misses)
    }
}

impl std::ops::Add for Counts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
        }
    }
}

/// The 256 counter files of one kind under a cache root.
#[derive(Debug, Clone)]
pub struct ShardedCounters {
    root: PathBuf,
    kind: &'static str,
    lock: FileLock,
}

impl ShardedCounters {
    /// Counters named `kind` under `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, kind: &'static str) -> Self {
        Self {
            root: root.into(),
            kind,
            lock: FileLock::new(),
        }
    }

    /// Use custom lock timing
    #[must_use]
    pub fn with_lock(mut self, lock: FileLock) -> Self {
        self.lock = lock;
        self
    }

    /// Counter file name
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Path of the counter file for `shard`
    #[must_use]
    pub fn shard_path(&self, shard: &str) -> PathBuf {
        self.root.join(shard).join(self.kind)
    }

    /// Count one lookup of `digest`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Lock`] if the shard lock cannot be taken, or
    /// an I/O error if the counter file cannot be written.
    pub fn record(&self, digest: &Digest, hit: bool) -> BackendResult<()> {
        let path = self.shard_path(digest.shard());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| BackendError::io_with_context("create shard directory", dir, e))?;
        }

        let _guard = self.lock.acquire(&path)?;
        let mut counts = read_counts(&path);
        if hit {
            counts.hits += 1;
        } else {
            counts.misses += 1;
        }
        write_counts(&path, counts)
    }

    /// Sum of all shards, each read under its lock.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Lock`] if a shard lock cannot be taken.
    pub fn totals(&self) -> BackendResult<Counts> {
        let mut totals = Counts::default();
        for index in 0..SHARD_COUNT {
            let path = self.shard_path(&shard_name(index));
            if !path.exists() && !lock_path_for(&path).exists() {
                continue;
            }
            let _guard = self.lock.acquire(&path)?;
            totals = totals + read_counts(&path);
        }
        Ok(totals)
    }

    /// Delete every counter file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing file cannot be removed.
    pub fn clear(&self) -> BackendResult<()> {
        for index in 0..SHARD_COUNT {
            let path = self.shard_path(&shard_name(index));
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BackendError::io_with_context("remove", path, e)),
            }
        }
        Ok(())
    }
}

/// Counts stored at `path`; absent or malformed files count as zero.
fn read_counts(path: &Path) -> Counts {
    match fs::read_to_string(path) {
        Ok(contents) => Counts::parse(&contents).unwrap_or_else(|| {
            tracing::warn!(
                path = %path.display(),
                contents = %contents.trim(),
                "Malformed stats file, resetting"
            );
            Counts::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Counts::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read stats file");
            Counts::default()
        }
    }
}

fn write_counts(path: &Path, counts: Counts) -> BackendResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| BackendError::io_with_context("create temp file in", dir, e))?;
    tmp.write_all(counts.render().as_bytes())
        .map_err(|e| BackendError::io_with_context("write", tmp.path().to_path_buf(), e))?;
    tmp.persist(path)
        .map_err(|e| BackendError::io_with_context("replace", path, e.error))?;
    Ok(())
}
