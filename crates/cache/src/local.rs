//! Local filesystem backend
//!
//! Entries live at `<root>/<shard>/<suffix>`. Reads refresh the entry's
//! modification time so an external age-based sweeper can evict cold entries.

use crate::backend::{CacheBackend, CacheStats};
use crate::{BackendError, BackendResult};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tidycache_core::Digest;
use tidycache_core::digest::ENTRY_FILENAME_PATTERN;
use walkdir::WalkDir;

static ENTRY_FILENAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(ENTRY_FILENAME_PATTERN).ok());

/// Whether `name` is a cache entry file name (a digest suffix).
#[must_use]
pub fn is_entry_filename(name: &str) -> bool {
    ENTRY_FILENAME
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// Cache backend storing entries as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Backend rooted at `root`; directories are created on first store.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `digest`
    #[must_use]
    pub fn entry_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.shard()).join(digest.suffix())
    }

    /// Paths of all stored entries.
    #[must_use]
    pub fn entries(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.file_name().to_str().is_some_and(is_entry_filename))
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    fn touch(path: &Path) {
        let result = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_modified(SystemTime::now()));
        if let Err(e) = result {
            tracing::debug!(path = %path.display(), error = %e, "Failed to refresh entry mtime");
        }
    }
}

impl CacheBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn is_cached(&self, digest: &Digest) -> bool {
        let path = self.entry_path(digest);
        if path.is_file() {
            Self::touch(&path);
            tracing::debug!(digest = %digest, path = %path.display(), "Cache hit");
            true
        } else {
            tracing::debug!(digest = %digest, "Cache miss");
            false
        }
    }

    fn get_data(&self, digest: &Digest) -> Option<Vec<u8>> {
        let path = self.entry_path(digest);
        match fs::read(&path) {
            Ok(data) => {
                Self::touch(&path);
                tracing::debug!(digest = %digest, bytes = data.len(), "Cache hit");
                Some(data)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(digest = %digest, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    fn store_with_data(&self, digest: &Digest, data: &[u8]) -> BackendResult<()> {
        let path = self.entry_path(digest);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)
            .map_err(|e| BackendError::io_with_context("create shard directory", dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| BackendError::io_with_context("create temp file in", dir, e))?;
        tmp.write_all(data)
            .map_err(|e| BackendError::io_with_context("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(&path)
            .map_err(|e| BackendError::io_with_context("store", &path, e.error))?;

        tracing::debug!(digest = %digest, bytes = data.len(), "Stored cache entry");
        Ok(())
    }

    fn query_stats(&self) -> CacheStats {
        let mut stats = CacheStats::new();
        stats.insert("cached_count", self.entries().len());
        stats
    }

    fn clear_stats(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Recursively delete a cache root. A missing root is not an error.
///
/// # Errors
///
/// Returns an I/O error if the directory exists but cannot be removed.
pub fn remove_cache_root(root: &Path) -> BackendResult<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackendError::io_with_context("remove", root, e)),
    }
}
