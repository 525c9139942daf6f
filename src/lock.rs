//! Single-instance guard for a run.
//!
//! An exclusive, non-blocking advisory lock on a well-known file. If another
//! run holds it, the caller gets `Ok(None)` and should exit quietly. The lock
//! is released when the [`RunLock`] is dropped; the file itself is left in
//! place so that a waiting process never locks an unlinked inode.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::LockError;

/// Held lock on the run lock file.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock without blocking.
    ///
    /// # Errors
    /// Returns [`LockError::Open`] if the lock file or its parent directory
    /// cannot be created or opened, and [`LockError::Lock`] for lock failures
    /// other than contention.
    pub fn acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let open_err = |source| LockError::Open {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(open_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Run lock acquired");
                Ok(Some(Self {
                    file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                tracing::info!(path = %path.display(), "Another run holds the lock");
                Ok(None)
            }
            Err(source) => Err(LockError::Lock {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}
