//! Keeps the system awake while the access point is active.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

const WAKE_LOCK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::wake_lock");

/// Name of the lock held while the access point is active.
pub const HOTSPOT_WAKE_LOCK: &str = "hotspot_wake_lock";

/// Errors raised by wake-lock calls.
#[derive(Debug, Error)]
pub enum WakeLockError {
    /// The kernel rejected the lock or unlock write.
    #[error("failed to write wake lock {name} to {path:?}: {source}")]
    Write {
        /// Lock name.
        name: String,
        /// Control file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Process-wide named wake locks.
pub trait WakeLock: Send + Sync {
    /// Acquires the lock called `name`.
    fn acquire(&self, name: &str) -> Result<(), WakeLockError>;

    /// Releases the lock called `name`.
    fn release(&self, name: &str) -> Result<(), WakeLockError>;
}

/// [`WakeLock`] writing lock names to `wake_lock` and `wake_unlock`.
///
/// Kernels built without wake-lock support do not expose these files, so a
/// missing file is logged and treated as success.
#[derive(Debug, Clone)]
pub struct SysfsWakeLock {
    dir: PathBuf,
}

impl SysfsWakeLock {
    /// Uses the control files under `dir` (usually `/sys/power`).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write(&self, file: &str, name: &str) -> Result<(), WakeLockError> {
        let path = self.dir.join(file);
        let result = OpenOptions::new()
            .write(true)
            .open(&path)
            .and_then(|mut handle| handle.write_all(name.as_bytes()));
        match result {
            Ok(()) => {
                debug!(target: WAKE_LOCK_TARGET, file, name, "wake lock updated");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(target: WAKE_LOCK_TARGET, path = %path.display(), "wake locks unsupported");
                Ok(())
            }
            Err(source) => Err(WakeLockError::Write {
                name: name.to_owned(),
                path,
                source,
            }),
        }
    }
}

impl WakeLock for SysfsWakeLock {
    fn acquire(&self, name: &str) -> Result<(), WakeLockError> {
        self.write("wake_lock", name)
    }

    fn release(&self, name: &str) -> Result<(), WakeLockError> {
        self.write("wake_unlock", name)
    }
}

/// A held wake lock, released when dropped.
pub struct WakeLockGuard {
    lock: Arc<dyn WakeLock>,
    name: &'static str,
}

impl WakeLockGuard {
    /// Acquires `name` on `lock`.
    ///
    /// # Errors
    ///
    /// Propagates the acquisition failure; nothing is held in that case.
    pub fn acquire(lock: Arc<dyn WakeLock>, name: &'static str) -> Result<Self, WakeLockError> {
        lock.acquire(name)?;
        Ok(Self { lock, name })
    }
}

impl std::fmt::Debug for WakeLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeLockGuard").field("name", &self.name).finish()
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        if let Err(error) = self.lock.release(self.name) {
            warn!(target: WAKE_LOCK_TARGET, error = %error, "failed to release wake lock");
        }
    }
}
