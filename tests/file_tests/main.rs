//! Tests for the data file roles
//!
//! - `durable_tests`: `DurableFile` over a real pool
//! - `sequential_tests`: cursor semantics
//! - `random_tests`: positional reads
//! - `writable_tests`: buffering, partial commits, close

mod durable_tests;
mod sequential_tests;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use atlasenv::file::{DurableAppend, DurableFile, DurableRead};
use atlasenv::heap::PoolOptions;
use atlasenv::storage::PoolManager;
use atlasenv::{EnvError, Result};
use tempfile::TempDir;

// =============================================================================
// Pool-backed Helpers
// =============================================================================

pub fn setup_manager() -> (TempDir, PoolManager) {
    let temp_dir = TempDir::new().unwrap();
    let options = PoolOptions {
        capacity: 4 * 1024 * 1024,
        mode: 0o664,
        sync_on_commit: false,
    };
    (temp_dir, PoolManager::new(options))
}

pub fn data_path(temp_dir: &TempDir, name: &str) -> PathBuf {
    temp_dir.path().join(name)
}

/// A pool-backed file holding `content`
pub fn durable_file_with(manager: &PoolManager, path: &Path, content: &[u8]) -> DurableFile {
    let (pool, _) = manager.open_or_create(path).unwrap();
    let file = DurableFile::open_for_append(pool, 1024 * 1024).unwrap();
    let mut written = 0;
    while written < content.len() {
        written += file.append(&content[written..]).unwrap();
    }
    file
}

/// Deterministic, non-repeating test content
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

// =============================================================================
// In-memory Durable Content
// =============================================================================

/// Scripted behavior for the next append calls
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Fail with an interrupted error, committing nothing
    Interrupt,
    /// Commit at most this many bytes
    Partial(usize),
    /// Commit nothing and return 0
    Zero,
    /// Fail with a non-retryable error
    Fail,
}

/// In-memory content whose appends follow a script, then commit fully
#[derive(Default)]
pub struct MemFile {
    pub data: RefCell<Vec<u8>>,
    pub script: RefCell<VecDeque<Step>>,
    /// Size of every successful append call
    pub commits: RefCell<Vec<usize>>,
    pub syncs: Cell<usize>,
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: &[u8]) -> Self {
        let file = Self::default();
        file.data.borrow_mut().extend_from_slice(data);
        file
    }

    pub fn scripted(steps: &[Step]) -> Self {
        let file = Self::default();
        file.script.borrow_mut().extend(steps.iter().copied());
        file
    }
}

impl DurableRead for MemFile {
    fn len(&self) -> Result<u64> {
        Ok(self.data.borrow().len() as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.data.borrow();
        if offset >= data.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }
}

impl DurableAppend for MemFile {
    fn append(&self, data: &[u8]) -> Result<usize> {
        let n = match self.script.borrow_mut().pop_front() {
            Some(Step::Interrupt) => {
                return Err(EnvError::io("mem", io::ErrorKind::Interrupted, "interrupted"))
            }
            Some(Step::Fail) => return Err(EnvError::io("mem", io::ErrorKind::Other, "device gone")),
            Some(Step::Zero) => return Ok(0),
            Some(Step::Partial(max)) => data.len().min(max),
            None => data.len(),
        };
        self.data.borrow_mut().extend_from_slice(&data[..n]);
        self.commits.borrow_mut().push(n);
        Ok(n)
    }

    fn sync(&self) -> Result<()> {
        self.syncs.set(self.syncs.get() + 1);
        Ok(())
    }
}

// `&MemFile` lets a test inspect the content while a writer owns the handle
impl DurableAppend for &MemFile {
    fn append(&self, data: &[u8]) -> Result<usize> {
        (**self).append(data)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }
}

/// Reader whose every call fails
pub struct BrokenFile;

impl DurableRead for BrokenFile {
    fn len(&self) -> Result<u64> {
        Err(EnvError::io("broken", io::ErrorKind::Other, "unreadable"))
    }

    fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize> {
        Err(EnvError::io("broken", io::ErrorKind::Other, "unreadable"))
    }
}
