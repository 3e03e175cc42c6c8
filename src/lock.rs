// src/lock.rs

//! Exclusive ownership of a destination bin directory
//!
//! Two installs into the same bin directory must not interleave, so the
//! Kitchen holds a [`BinDirLock`] for the whole install and test operation.
//! The lock file lives outside the bin directory (keyed by a hash of its
//! path) so the directory only ever contains installed executables.
//!
//! The lock is an advisory `flock(LOCK_EX)` taken without blocking: a second
//! install fails fast with [`Error::Locked`] instead of queueing.

use crate::error::{Error, Result};
use crate::hash::sha256_bytes;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive lock on one bin directory, released on drop
#[derive(Debug)]
pub struct BinDirLock {
    file: File,
    path: PathBuf,
}

impl BinDirLock {
    /// Lock file used for `bin_dir` inside `lock_dir`
    pub fn lock_path(lock_dir: &Path, bin_dir: &Path) -> PathBuf {
        let key = bin_dir.canonicalize().unwrap_or_else(|_| bin_dir.to_path_buf());
        let digest = sha256_bytes(key.to_string_lossy().as_bytes());
        lock_dir.join(format!("{}.lock", &digest[..16]))
    }

    /// Try to take the lock without blocking
    pub fn try_acquire(lock_dir: &Path, bin_dir: &Path) -> Result<Self> {
        fs::create_dir_all(lock_dir)?;
        let path = Self::lock_path(lock_dir, bin_dir);
        let file = File::create(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired lock {} for {}", path.display(), bin_dir.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(Error::Locked {
                path: bin_dir.to_path_buf(),
            }),
            Err(e) => Err(Error::IoError(format!(
                "Failed to lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BinDirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
