//! Env Module
//!
//! The environment facade that upper layers talk to.
//!
//! ## Responsibilities
//! - Open data files in one of three roles, backed by pools
//! - Record newly created data files in the directory registry
//! - Pass metadata operations (listing, rename, stat, mkdir) to the OS
//! - Advisory locks, background work, clock

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::background::{self, TaskQueue};
use crate::config::EnvConfig;
use crate::error::{EnvError, Result};
use crate::file::{DurableFile, RandomAccessFile, SequentialFile, WritableFile};
use crate::heap::PoolRef;
use crate::lock::{FileLock, LockTable};
use crate::storage::{DirectoryRegistry, PoolManager};

/// How an existing file is treated when opened for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Start from empty content
    Truncate,
    /// Continue after existing content
    Append,
}

/// The storage environment
///
/// ## Concurrency Model
///
/// - **File creation**: serialized by `create_lock`, so creating a pool
///   and registering it happen as one step relative to other creations
/// - **Pools**: one mutex per open pool, shared by all handles to it
/// - **Registry**: its own mutex, only taken under `create_lock` or for
///   read-only snapshots
/// - **Background work**: a single worker drains `tasks` in FIFO order
pub struct Env {
    /// Environment configuration
    config: EnvConfig,

    /// Open data file pools
    pools: PoolManager,

    /// Durable record of every data file created
    registry: Mutex<DirectoryRegistry>,

    /// Serializes "create pool + register it"
    create_lock: Mutex<()>,

    /// Paths locked by this process
    locks: LockTable,

    /// Background work queue
    tasks: TaskQueue,
}

impl Env {
    /// Name used for threads started through `start_thread`
    const THREAD_NAME: &'static str = "atlasenv-thread";

    /// Open an environment with the given config
    ///
    /// Opens (or creates) the directory registry; data file pools are
    /// opened lazily, one per file.
    pub fn open(config: EnvConfig) -> Result<Self> {
        if let Some(parent) = config.registry_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| EnvError::from_io(parent, e))?;
            }
        }

        let registry =
            DirectoryRegistry::open(&config.registry_path, &config.registry_pool_options())?;
        let pools = PoolManager::new(config.data_pool_options());
        let tasks = TaskQueue::new(config.background_thread_name.clone());

        tracing::info!(
            registry = %config.registry_path.display(),
            registered = registry.len(),
            "environment opened"
        );

        Ok(Self {
            config,
            pools,
            registry: Mutex::new(registry),
            create_lock: Mutex::new(()),
            locks: LockTable::new(),
            tasks,
        })
    }

    /// Open with the directory registry inside `dir` (convenience method)
    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(EnvConfig::in_dir(dir))
    }

    // =========================================================================
    // Data Files
    // =========================================================================

    /// Open an existing file for sequential reading
    pub fn open_sequential(&self, path: impl AsRef<Path>) -> Result<SequentialFile> {
        let path = path.as_ref();
        let file = self.open_for_read(path)?;
        tracing::debug!(path = %path.display(), "opened sequential file");
        Ok(SequentialFile::new(path, file))
    }

    /// Open an existing file for random-access reading
    pub fn open_random(&self, path: impl AsRef<Path>) -> Result<RandomAccessFile> {
        let path = path.as_ref();
        let file = self.open_for_read(path)?;
        tracing::debug!(path = %path.display(), "opened random access file");
        Ok(RandomAccessFile::new(path, file))
    }

    /// Create a file for writing; an existing file starts over empty
    pub fn open_writable(&self, path: impl AsRef<Path>) -> Result<WritableFile> {
        let path = path.as_ref();
        let file = self.open_for_write(path, WriteMode::Truncate)?;
        tracing::debug!(path = %path.display(), "opened writable file");
        Ok(WritableFile::new(path, file, self.config.write_buffer_size))
    }

    /// Open a file for appending, creating it if absent
    pub fn open_appendable(&self, path: impl AsRef<Path>) -> Result<WritableFile> {
        let path = path.as_ref();
        let file = self.open_for_write(path, WriteMode::Append)?;
        tracing::debug!(path = %path.display(), "opened appendable file");
        Ok(WritableFile::new(path, file, self.config.write_buffer_size))
    }

    // =========================================================================
    // Filesystem Pass-Through
    // =========================================================================

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Names of the entries in `dir`
    pub fn children(&self, dir: impl AsRef<Path>) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| EnvError::from_io(dir, e))? {
            let entry = entry.map_err(|e| EnvError::from_io(dir, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Unlink a file. Its registry entry is kept.
    pub fn delete_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.pools.evict(path);
        fs::remove_file(path).map_err(|e| EnvError::from_io(path, e))
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(path).map_err(|e| EnvError::from_io(path, e))
    }

    pub fn delete_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::remove_dir(path).map_err(|e| EnvError::from_io(path, e))
    }

    /// Size of the file on disk
    ///
    /// For a data file this is the size of its pool file, not the length of
    /// its content; readers report content length through `len()`.
    pub fn file_size(&self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|e| EnvError::from_io(path, e))
    }

    pub fn rename_file(&self, src: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
        let (src, target) = (src.as_ref(), target.as_ref());
        self.pools.evict(src);
        self.pools.evict(target);
        fs::rename(src, target).map_err(|e| EnvError::from_io(src, e))
    }

    // =========================================================================
    // Locks
    // =========================================================================

    /// Take the advisory lock on `path`
    pub fn lock_file(&self, path: impl AsRef<Path>) -> Result<FileLock> {
        self.locks.lock_file(path.as_ref())
    }

    pub fn unlock_file(&self, lock: FileLock) -> Result<()> {
        self.locks.unlock_file(lock)
    }

    // =========================================================================
    // Threads and Time
    // =========================================================================

    /// Run `task` on the background worker after everything already queued
    pub fn schedule<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.schedule(task)
    }

    /// Run `task` on a new detached thread
    pub fn start_thread<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        background::start_thread(Self::THREAD_NAME, task)
    }

    /// Microseconds since the unix epoch
    pub fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    pub fn sleep_for_micros(&self, micros: u64) {
        thread::sleep(Duration::from_micros(micros));
    }

    /// Scratch directory for tests: `$TEST_TMPDIR` if set, otherwise a
    /// directory under the system temp dir. Created if missing.
    pub fn test_directory(&self) -> Result<PathBuf> {
        let dir = match std::env::var_os("TEST_TMPDIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir().join(format!("atlasenvtest-{}", std::process::id())),
        };
        fs::create_dir_all(&dir).map_err(|e| EnvError::from_io(&dir, e))?;
        Ok(dir)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drain and stop the background worker, then close the registry
    pub fn shutdown(self) -> Result<()> {
        self.tasks.shutdown()?;
        self.registry.into_inner().close()?;
        tracing::info!("environment shut down");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Snapshot of the directory registry, in creation order
    pub fn registered_files(&self) -> Result<Vec<PoolRef>> {
        self.registry.lock().entries()
    }

    /// Number of data file pools currently mapped
    pub fn open_pool_count(&self) -> usize {
        self.pools.open_count()
    }

    /// Number of background tasks waiting to run
    pub fn pending_tasks(&self) -> usize {
        self.tasks.pending()
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn open_for_read(&self, path: &Path) -> Result<DurableFile> {
        let pool = self.pools.open_existing(path)?;
        DurableFile::open_existing(pool, self.config.max_commit_bytes)
    }

    /// Open or create the pool for a writer and, if it was created,
    /// register it before handing out the file
    fn open_for_write(&self, path: &Path, mode: WriteMode) -> Result<DurableFile> {
        let _create_guard = self.create_lock.lock();

        let (pool, created) = self.pools.open_or_create(path)?;

        if created {
            let (pool_id, root) = {
                let guard = pool.lock();
                (guard.pool_id(), guard.root())
            };
            if let Err(e) = self.registry.lock().register(path, pool_id, root) {
                // Unregistered pools must not outlive the failed call
                drop(pool);
                self.pools.evict(path);
                if let Err(cleanup) = fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove unregistered pool");
                }
                return Err(e);
            }
        }

        let max_commit = self.config.max_commit_bytes;
        match mode {
            WriteMode::Truncate => DurableFile::open_truncated(pool, max_commit),
            WriteMode::Append => DurableFile::open_for_append(pool, max_commit),
        }
    }
}
