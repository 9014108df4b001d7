//! Cross-process readiness locks.
//!
//! A tenant database is "not ready" while some process holds its readiness
//! lock. The lock is an OS advisory lock on a file derived from the lock key,
//! so it is exclusive across processes on the host, exclusive between
//! independent acquisitions inside one process, and released by the kernel
//! when the holder exits for any reason.
//!
//! Lock files are left in place after release. Removing them would let a
//! waiter lock an unlinked inode while a newcomer locks a fresh file.
//!
//! Locks are not re-entrant: acquiring a key twice from the same thread
//! without releasing blocks forever.

use crate::{TenantError, TenantResult};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix appended to a lock key to form the lock file name.
pub const LOCK_FILE_SUFFIX: &str = ".ready.lock";

/// Advisory file lock gating tenant database readiness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessGate;

impl ReadinessGate {
    /// Create a readiness gate.
    pub fn new() -> Self {
        Self
    }

    /// Lock file backing `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use tenanted_db::ReadinessGate;
    ///
    /// let path = ReadinessGate::lock_file(Path::new("/tmp/tenanted/postgresql/app_acme"));
    /// assert_eq!(path, Path::new("/tmp/tenanted/postgresql/app_acme.ready.lock"));
    /// ```
    pub fn lock_file(key: &Path) -> PathBuf {
        let mut path = OsString::from(key.as_os_str());
        path.push(LOCK_FILE_SUFFIX);
        PathBuf::from(path)
    }

    /// Whether any holder currently holds the lock for `key`.
    ///
    /// Never creates the lock file and never waits. The answer can be stale
    /// by the time the caller acts on it.
    pub fn is_locked(&self, key: &Path) -> TenantResult<bool> {
        let path = Self::lock_file(key);

        let file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(TenantError::lock(path, e)),
        };

        // A shared lock fails only while an exclusive holder exists
        let locked = match file.try_lock_shared() {
            Ok(()) => {
                file.unlock().map_err(|e| TenantError::lock(&path, e))?;
                false
            }
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Error(e)) => return Err(TenantError::lock(path, e)),
        };

        debug!(path = %path.display(), locked, "Checked readiness lock");
        Ok(locked)
    }

    /// Acquire the lock for `key`, blocking the calling thread until it is free.
    pub fn acquire(&self, key: &Path) -> TenantResult<ReadinessLockHandle> {
        let path = Self::lock_file(key);
        let file = open_lock_file(&path)?;

        debug!(path = %path.display(), "Waiting for readiness lock");
        file.lock().map_err(|e| TenantError::lock(&path, e))?;

        info!(path = %path.display(), "Acquired readiness lock");
        Ok(ReadinessLockHandle::new(path, file))
    }

    /// Try to acquire the lock for `key` without waiting.
    ///
    /// Returns `None` when another holder has it. `None` can also be
    /// transient: [`ReadinessGate::is_locked`] in another process briefly
    /// holds a shared lock on the same file, so a free lock may be reported
    /// as taken. Retry, or use [`ReadinessGate::acquire`] to wait.
    pub fn try_acquire(&self, key: &Path) -> TenantResult<Option<ReadinessLockHandle>> {
        let path = Self::lock_file(key);
        let file = open_lock_file(&path)?;

        match file.try_lock() {
            Ok(()) => {
                info!(path = %path.display(), "Acquired readiness lock");
                Ok(Some(ReadinessLockHandle::new(path, file)))
            }
            Err(TryLockError::WouldBlock) => {
                debug!(path = %path.display(), "Readiness lock already held");
                Ok(None)
            }
            Err(TryLockError::Error(e)) => Err(TenantError::lock(path, e)),
        }
    }

    /// Acquire the lock for `key` from async code.
    ///
    /// The blocking wait runs on tokio's blocking pool. If the returned
    /// future is dropped while waiting, the lock is released as soon as the
    /// background acquisition completes.
    pub async fn acquire_async(&self, key: &Path) -> TenantResult<ReadinessLockHandle> {
        let gate = *self;
        let owned_key = key.to_path_buf();

        tokio::task::spawn_blocking(move || gate.acquire(&owned_key))
            .await
            .map_err(|e| TenantError::lock(Self::lock_file(key), io::Error::other(e)))?
    }

    /// Run `critical_section` while holding the lock for `key`.
    ///
    /// The lock is released on every exit path, including panics.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenanted_db::ReadinessGate;
    ///
    /// let dir = std::env::temp_dir().join("tenanted-doc-gate");
    /// let key = dir.join("app_acme");
    /// let gate = ReadinessGate::new();
    ///
    /// let locked_inside = gate.lock(&key, || gate.is_locked(&key).unwrap()).unwrap();
    /// assert!(locked_inside);
    /// assert!(!gate.is_locked(&key).unwrap());
    /// ```
    pub fn lock<T>(&self, key: &Path, critical_section: impl FnOnce() -> T) -> TenantResult<T> {
        let handle = self.acquire(key)?;
        let value = critical_section();
        handle.release()?;
        Ok(value)
    }

    /// Async counterpart of [`ReadinessGate::lock`].
    ///
    /// The lock is released once the critical section finishes, fails,
    /// panics or is cancelled. A failure of the critical section takes
    /// precedence over a failure to release.
    pub async fn lock_async<F, Fut, T>(&self, key: &Path, critical_section: F) -> TenantResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TenantResult<T>>,
    {
        let handle = self.acquire_async(key).await?;
        let result = critical_section().await;

        match (result, handle.release()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(error = %release_err, "Readiness lock release failed after critical section error");
                Err(e)
            }
        }
    }
}

fn open_lock_file(path: &Path) -> TenantResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TenantError::lock(path, e))?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| TenantError::lock(path, e))
}

/// Held readiness lock. Released on [`ReadinessLockHandle::release`] or drop.
#[derive(Debug)]
pub struct ReadinessLockHandle {
    path: PathBuf,
    file: Option<File>,
}

impl ReadinessLockHandle {
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: Some(file),
        }
    }

    /// Lock file held by this handle.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting failures.
    pub fn release(mut self) -> TenantResult<()> {
        if let Some(file) = self.file.take() {
            file.unlock().map_err(|e| TenantError::lock(&self.path, e))?;
            info!(path = %self.path.display(), "Released readiness lock");
        }
        Ok(())
    }
}

impl Drop for ReadinessLockHandle {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock even if unlock fails
        if let Some(file) = self.file.take() {
            match file.unlock() {
                Ok(()) => debug!(path = %self.path.display(), "Released readiness lock on drop"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to unlock readiness lock"),
            }
        }
    }
}
