//! Single-owner lock on the queue file
//!
//! Only one process may own a queue file. The owner holds an exclusive
//! advisory lock on a `<queue>.lock` sibling for as long as its
//! [`QueueManager`](super::QueueManager) is alive; the lock is released when
//! the file handle is dropped, including when the process dies.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::constants::queue::LOCK_FILE_SUFFIX;
use crate::errors::{QueueError, QueueResult};

/// Held exclusive lock on a queue file
#[derive(Debug)]
pub struct QueueLock {
    path: PathBuf,
    file: File,
}

impl QueueLock {
    /// Lock the queue stored at `queue_path` without waiting
    ///
    /// Fails with [`QueueError::InUse`] when another owner holds it.
    pub fn acquire(queue_path: &Path) -> QueueResult<Self> {
        let path = lock_path(queue_path);
        let lock_error = |source| QueueError::Lock {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(lock_error)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(QueueError::InUse {
                    path: queue_path.to_path_buf(),
                });
            }
            return Err(lock_error(e));
        }

        // Owner pid is informational only
        let _ = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()));

        debug!("Locked queue {}", queue_path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released {}", self.path.display());
    }
}

/// Lock file guarding `queue_path`
pub fn lock_path(queue_path: &Path) -> PathBuf {
    let mut name = queue_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(LOCK_FILE_SUFFIX);
    queue_path.with_file_name(name)
}
