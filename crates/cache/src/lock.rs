//! Shard file locking
//!
//! Serializes read-modify-write cycles on a stats shard across processes.
//! The lock is a sibling `<file>.lock` created with `create_new`; whoever
//! creates it holds the lock until the returned [`LockGuard`] is dropped.

use crate::LockError;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Default lock timeout
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Lock acquisition poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Locks older than this are assumed abandoned by a crashed process
pub const STALE_LOCK_THRESHOLD: Duration = Duration::from_secs(30);

/// Lock metadata stored in lock file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockMetadata {
    /// Process ID that holds the lock
    pub pid: u32,
    /// Timestamp (seconds since epoch) when lock was acquired
    pub acquired_at: u64,
}

impl LockMetadata {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: current_timestamp(),
        }
    }

    fn serialize(&self) -> String {
        format!("{}:{}", self.pid, self.acquired_at)
    }

    fn deserialize(s: &str) -> Option<Self> {
        let (pid, acquired_at) = s.trim().split_once(':')?;
        Some(Self {
            pid: pid.parse().ok()?,
            acquired_at: acquired_at.parse().ok()?,
        })
    }
}

/// Lock file path guarding `target`.
#[must_use]
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Acquire-with-timeout file lock.
#[derive(Debug, Clone)]
pub struct FileLock {
    timeout: Duration,
    poll_interval: Duration,
    stale_threshold: Duration,
}

impl Default for FileLock {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_threshold: STALE_LOCK_THRESHOLD,
        }
    }
}

impl FileLock {
    /// Lock with default timing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the acquisition timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the age after which a held lock is broken
    #[must_use]
    pub const fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Acquire the lock guarding `target`, polling until the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if the lock stays held, or
    /// [`LockError::Io`] if the lock file cannot be created.
    pub fn acquire(&self, target: &Path) -> Result<LockGuard, LockError> {
        let lock_path = lock_path_for(target);
        let start = Instant::now();

        loop {
            match Self::try_acquire_path(&lock_path) {
                Ok(guard) => return Ok(guard),
                Err(LockError::HeldByOther { pid, age_secs }) => {
                    if start.elapsed() >= self.timeout {
                        return Err(LockError::Timeout {
                            path: lock_path,
                            timeout_ms: u64::try_from(self.timeout.as_millis())
                                .unwrap_or(u64::MAX),
                        });
                    }

                    if Duration::from_secs(age_secs) > self.stale_threshold
                        && break_stale_lock(&lock_path, self.stale_threshold)
                    {
                        tracing::warn!(
                            lock = %lock_path.display(),
                            holder_pid = pid,
                            age_secs,
                            "Broke stale lock"
                        );
                        continue;
                    }
                }
                Err(e) => return Err(e),
            }

            std::thread::sleep(self.poll_interval);
        }
    }

    /// Try to acquire the lock guarding `target` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::HeldByOther`] if the lock is taken.
    pub fn try_acquire(target: &Path) -> Result<LockGuard, LockError> {
        Self::try_acquire_path(&lock_path_for(target))
    }

    fn try_acquire_path(lock_path: &Path) -> Result<LockGuard, LockError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(mut file) => {
                // The guard exists before the write so a failed write still
                // removes the file.
                let guard = LockGuard {
                    lock_path: lock_path.to_path_buf(),
                };
                file.write_all(LockMetadata::current().serialize().as_bytes())
                    .map_err(|source| LockError::Io {
                        path: lock_path.to_path_buf(),
                        source,
                    })?;
                Ok(guard)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let (pid, age_secs) = lock_holder(lock_path);
                Err(LockError::HeldByOther { pid, age_secs })
            }
            Err(source) => Err(LockError::Io {
                path: lock_path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Guard that releases lock when dropped
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
}

impl LockGuard {
    /// Path of the held lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(
                lock = %self.lock_path.display(),
                error = %e,
                "Failed to release lock"
            );
        }
    }
}

/// Holder pid and lock age. A lock whose metadata is not written yet (or is
/// unreadable) is aged by its modification time so a fresh lock is never
/// mistaken for a stale one.
fn lock_holder(path: &Path) -> (u32, u64) {
    if let Some(meta) = fs::read_to_string(path)
        .ok()
        .as_deref()
        .and_then(LockMetadata::deserialize)
    {
        return (meta.pid, current_timestamp().saturating_sub(meta.acquired_at));
    }
    let age_secs = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(0, |age| age.as_secs());
    (0, age_secs)
}

/// Move a stale lock file out of the way and delete it.
///
/// The rename claims the file atomically, so of several waiters that saw the
/// same stale lock only one removes it. If the claimed file turns out to be
/// fresh (another waiter already replaced the stale one), it is linked back.
/// Returns false when the lock could not be broken and is still held.
fn break_stale_lock(lock_path: &Path, stale_threshold: Duration) -> bool {
    static CLAIMS: AtomicU64 = AtomicU64::new(0);

    // Only regular files are locks we created
    if !fs::symlink_metadata(lock_path).is_ok_and(|m| m.is_file()) {
        return false;
    }
    let is_stale = |path: &Path| Duration::from_secs(lock_holder(path).1) > stale_threshold;
    if !is_stale(lock_path) {
        return false;
    }

    let mut name = lock_path.as_os_str().to_owned();
    name.push(format!(
        ".stale.{}.{}",
        std::process::id(),
        CLAIMS.fetch_add(1, Ordering::Relaxed)
    ));
    let claimed = PathBuf::from(name);
    if fs::rename(lock_path, &claimed).is_err() {
        return false;
    }

    if !is_stale(&claimed) {
        if let Err(e) = fs::hard_link(&claimed, lock_path) {
            tracing::warn!(
                lock = %lock_path.display(),
                error = %e,
                "Failed to restore live lock"
            );
        }
        let _ = fs::remove_file(&claimed);
        return false;
    }

    if let Err(e) = fs::remove_file(&claimed) {
        tracing::warn!(lock = %claimed.display(), error = %e, "Failed to remove stale lock");
    }
    true
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
