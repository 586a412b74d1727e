//! Advisory file locks
//!
//! OS record locks give no protection against a second lock taken by the
//! same process, so the set of paths this process holds is tracked
//! separately and checked first. A `FileLock` clears its table entry when
//! it is dropped, whether or not it went through `unlock_file`.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;

use crate::error::{EnvError, Result};

/// Process-local set of locked paths
#[derive(Debug, Default)]
pub struct LockTable {
    locked: Arc<Mutex<HashSet<PathBuf>>>,
}

/// A held lock: the open lock file plus its path
///
/// Dropping it releases the OS lock (by closing the file) and removes the
/// path from the table that granted it.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    table: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.table.lock().remove(&self.path);
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `path`; false if it is already present
    pub fn insert(&self, path: &Path) -> bool {
        self.locked.lock().insert(path.to_path_buf())
    }

    /// Remove `path` whether or not it is present
    pub fn remove(&self, path: &Path) {
        self.locked.lock().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.locked.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.locked.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock `path`, creating the lock file if needed
    ///
    /// Fails with `AlreadyLocked` if this process already holds the lock,
    /// or with an I/O error if another process does.
    pub fn lock_file(&self, path: &Path) -> Result<FileLock> {
        let mut open = OpenOptions::new();
        open.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open.mode(0o644);
        }
        let file = open.open(path).map_err(|e| EnvError::from_io(path, e))?;

        if !self.insert(path) {
            return Err(EnvError::AlreadyLocked {
                path: path.to_path_buf(),
            });
        }

        if let Err(e) = file.try_lock_exclusive() {
            self.remove(path);
            return Err(EnvError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }

        tracing::debug!(path = %path.display(), "acquired file lock");
        Ok(FileLock {
            file,
            path: path.to_path_buf(),
            table: Arc::clone(&self.locked),
        })
    }

    /// Release a lock taken with [`LockTable::lock_file`]
    ///
    /// The path leaves the table even if the OS unlock fails; dropping
    /// `lock` takes care of that.
    pub fn unlock_file(&self, lock: FileLock) -> Result<()> {
        let result = FileExt::unlock(&lock.file).map_err(|e| EnvError::Io {
            path: lock.path.clone(),
            source: e,
        });

        tracing::debug!(path = %lock.path.display(), "released file lock");
        drop(lock);
        result
    }
}
