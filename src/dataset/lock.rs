//! Advisory lock on the output dataset
//!
//! Two runs writing the same output file would interleave flushes and lose
//! records, so a run holds an exclusive fd-lock on `<output>.lock` until it ends.

use super::{DatasetError, DatasetResult};
use fd_lock::RwLock;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive lock held for the lifetime of a run
#[derive(Debug)]
pub struct DatasetLock {
    #[allow(dead_code)]
    lock: RwLock<File>,
    path: PathBuf,
}

impl DatasetLock {
    /// Path of the lock file guarding `dataset`.
    pub fn lock_path(dataset: &Path) -> PathBuf {
        let mut name = OsString::from(dataset.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Try to take the lock for `dataset` without blocking.
    ///
    /// # Errors
    /// [`DatasetError::LockError`] if another process holds it.
    pub fn try_acquire(dataset: &Path) -> DatasetResult<Self> {
        if let Some(parent) = dataset.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatasetError::IoError(e.to_string()))?;
        }

        let path = Self::lock_path(dataset);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DatasetError::LockError(format!("Failed to open lock file: {e}")))?;

        let mut lock = RwLock::new(file);
        let guard = lock.try_write().map_err(|e| {
            DatasetError::LockError(format!(
                "{} is in use by another run: {e}",
                dataset.display()
            ))
        })?;
        // The flock lives on the descriptor; it is released when `lock` closes the file.
        std::mem::forget(guard);

        Ok(Self { lock, path })
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
