//! Pool Manager
//!
//! Opens and creates data file pools, and tracks the open ones.
//!
//! ## Responsibilities
//! - Create a pool (plus root descriptor) on first open of a path
//! - Hand out shared handles so every reader/writer of one path uses the
//!   same mapping
//! - Close a mapping only when its last handle drops
//! - Treat different spellings of one path as the same file

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{EnvError, Result};
use crate::heap::{Pool, PoolLayout, PoolOptions};

/// Shared handle to an open data file pool
pub type SharedPool = Arc<PoolHandle>;

/// One open pool plus the lock serializing access to it
pub struct PoolHandle {
    path: PathBuf,
    pool: Mutex<Pool>,
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PoolHandle {
    fn new(path: &Path, pool: Pool) -> Self {
        Self {
            path: path.to_path_buf(),
            pool: Mutex::new(pool),
        }
    }

    /// Path the pool was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the pool for one operation
    pub fn lock(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock()
    }
}

/// Manages data file pools
///
/// ## Concurrency:
/// - `open`: weak references keyed by path, protected by a Mutex
/// - Each pool has its own Mutex inside its `PoolHandle`
/// - All methods use `&self` (no exclusive access needed)
pub struct PoolManager {
    /// Options applied to every pool this manager creates or opens
    options: PoolOptions,

    /// Open pools. A dead weak reference means the pool has been closed.
    open: Mutex<HashMap<PathBuf, Weak<PoolHandle>>>,
}

impl PoolManager {
    pub fn new(options: PoolOptions) -> Self {
        Self {
            options,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Open the pool at `path`, creating it if absent
    ///
    /// Returns the handle and whether the pool was created by this call.
    /// If the pool is already open, the existing mapping is shared.
    pub fn open_or_create(&self, path: &Path) -> Result<(SharedPool, bool)> {
        let key = pool_key(path);
        let mut open = self.open.lock();

        if let Some(handle) = open.get(&key).and_then(Weak::upgrade) {
            return Ok((handle, false));
        }

        let (pool, created) = Pool::open_or_create(path, PoolLayout::File, &self.options)?;
        let handle = Arc::new(PoolHandle::new(path, pool));
        Self::track(&mut open, key, &handle);

        Ok((handle, created))
    }

    /// Open the existing pool at `path`
    ///
    /// Fails with `NotFound` if nothing exists there.
    pub fn open_existing(&self, path: &Path) -> Result<SharedPool> {
        let key = pool_key(path);
        let mut open = self.open.lock();

        if let Some(handle) = open.get(&key).and_then(Weak::upgrade) {
            return Ok(handle);
        }

        if !path.exists() {
            return Err(EnvError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let pool = Pool::open(path, PoolLayout::File, &self.options)?;
        let handle = Arc::new(PoolHandle::new(path, pool));
        Self::track(&mut open, key, &handle);

        Ok(handle)
    }

    /// Stop sharing the mapping of `path`
    ///
    /// Handles already given out keep working; the next open of `path`
    /// maps the file afresh. Called when the file is deleted or renamed.
    pub fn evict(&self, path: &Path) {
        self.open.lock().remove(&pool_key(path));
    }

    /// Whether a live mapping of `path` is being shared
    pub fn is_open(&self, path: &Path) -> bool {
        self.open
            .lock()
            .get(&pool_key(path))
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Number of live mappings
    pub fn open_count(&self) -> usize {
        self.open
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Options applied to managed pools
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn track(open: &mut HashMap<PathBuf, Weak<PoolHandle>>, key: PathBuf, handle: &SharedPool) {
        open.retain(|_, weak| weak.strong_count() > 0);
        open.insert(key, Arc::downgrade(handle));
    }
}

/// Key under which the mapping of `path` is shared
///
/// The parent directory is canonicalized so that `db/x`, `./db/x` and an
/// absolute spelling of the same file share one mapping. The file name is
/// kept as given; the file itself may not exist yet.
fn pool_key(path: &Path) -> PathBuf {
    let (parent, name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (parent, name),
        _ => return path.to_path_buf(),
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match parent.canonicalize() {
        Ok(dir) => dir.join(name),
        Err(_) => path.to_path_buf(),
    }
}
