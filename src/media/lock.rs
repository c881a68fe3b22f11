//! Host-wide single-flight guard for image scans.
//!
//! The scan mount point is shared, so two scans on one host would mount over
//! each other. The library itself does not lock; front ends take a
//! [`ScanLock`] around scanning.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{InstallError, InstallResult};

/// Default lock file location.
pub const DEFAULT_SCAN_LOCK: &str = "/run/install/media-scan.lock";

/// Exclusive advisory lock held for the lifetime of the value.
#[derive(Debug)]
pub struct ScanLock {
    file: File,
    path: PathBuf,
}

impl ScanLock {
    /// Block until the lock at `path` is acquired.
    pub fn acquire(path: &Path) -> InstallResult<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .map_err(|e| InstallError::io("locking", path, e))?;
        tracing::debug!(lock = %path.display(), "scan lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Acquire without blocking; `None` when another scan holds the lock.
    pub fn try_acquire(path: &Path) -> InstallResult<Option<Self>> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(InstallError::io("locking", path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScanLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> InstallResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| InstallError::io("creating lock directory", parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| InstallError::io("opening lock file", path, e))
}
