//! File Module
//!
//! Data files whose content lives in a pool.
//!
//! ## Roles
//! - `SequentialFile`: implicit cursor, `read` + `skip`
//! - `RandomAccessFile`: stateless positional reads
//! - `WritableFile`: append-only, buffered
//!
//! All three wrap a `DurableFile`, seen through one of two minimal traits:
//! `DurableRead` for readers and `DurableAppend` for the writer.

mod random;
mod sequential;
mod writable;

use crate::error::{EnvError, Result};
use crate::heap::{ObjRef, ObjectKind};
use crate::storage::SharedPool;

pub use random::RandomAccessFile;
pub use sequential::SequentialFile;
pub use writable::WritableFile;

// =============================================================================
// Durable Interfaces
// =============================================================================

/// Read side of durable file content
pub trait DurableRead {
    /// Content length in bytes
    fn len(&self) -> Result<u64>;

    /// Copy up to `buf.len()` bytes starting at `offset`. Returns 0 at or
    /// past the end of content.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Write side of durable file content
pub trait DurableAppend {
    /// Durably append a prefix of `data`, returning how many bytes were
    /// committed. May commit fewer than `data.len()` bytes.
    fn append(&self, data: &[u8]) -> Result<usize>;

    /// Make every committed append durable
    fn sync(&self) -> Result<()>;
}

// =============================================================================
// DurableFile
// =============================================================================

/// File content object of one data file pool
///
/// The pool's root descriptor points at the content. A pool that has
/// never been written has no content and reads as empty.
pub struct DurableFile {
    pool: SharedPool,
    content: Option<ObjRef>,
    max_commit_bytes: usize,
}

impl DurableFile {
    /// Attach to whatever content the pool holds, without mutating it
    pub fn open_existing(pool: SharedPool, max_commit_bytes: usize) -> Result<Self> {
        let content = {
            let guard = pool.lock();
            guard.child(guard.root())?
        };
        Ok(Self::new(pool, content, max_commit_bytes))
    }

    /// Attach to the pool's content for appending, allocating it if the
    /// pool has none yet
    pub fn open_for_append(pool: SharedPool, max_commit_bytes: usize) -> Result<Self> {
        let content = {
            let mut guard = pool.lock();
            let root = guard.root();
            guard.transaction(|tx| match tx.child(root)? {
                Some(content) => Ok(content),
                None => {
                    let content = tx.allocate(ObjectKind::Bytes)?;
                    tx.set_child(root, Some(content))?;
                    Ok(content)
                }
            })?
        };
        Ok(Self::new(pool, Some(content), max_commit_bytes))
    }

    /// Replace the pool's content with a new, empty object
    ///
    /// The old content is freed in the same transaction, so a crash leaves
    /// either the old content or the empty file.
    pub fn open_truncated(pool: SharedPool, max_commit_bytes: usize) -> Result<Self> {
        let content = {
            let mut guard = pool.lock();
            let root = guard.root();
            guard.transaction(|tx| {
                let previous = tx.child(root)?;
                let content = tx.allocate(ObjectKind::Bytes)?;
                tx.set_child(root, Some(content))?;
                if let Some(previous) = previous {
                    tx.free(previous)?;
                }
                Ok(content)
            })?
        };
        Ok(Self::new(pool, Some(content), max_commit_bytes))
    }

    /// The pool handle backing this file
    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    fn new(pool: SharedPool, content: Option<ObjRef>, max_commit_bytes: usize) -> Self {
        Self {
            pool,
            content,
            max_commit_bytes: max_commit_bytes.max(1),
        }
    }
}

impl DurableRead for DurableFile {
    fn len(&self) -> Result<u64> {
        match self.content {
            Some(content) => Ok(self.pool.lock().bytes(content)?.len() as u64),
            None => Ok(0),
        }
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(content) = self.content else {
            return Ok(0);
        };

        let guard = self.pool.lock();
        let bytes = guard.bytes(content)?;
        if offset >= bytes.len() as u64 {
            return Ok(0);
        }

        let start = offset as usize;
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        Ok(n)
    }
}

impl DurableAppend for DurableFile {
    fn append(&self, data: &[u8]) -> Result<usize> {
        let content = self.content.ok_or_else(|| EnvError::InvalidReference {
            path: self.pool.path().to_path_buf(),
            reason: "file was opened without content to append to".to_string(),
        })?;

        let n = data.len().min(self.max_commit_bytes);
        self.pool
            .lock()
            .transaction(|tx| tx.append(content, &data[..n]))?;

        tracing::trace!(path = %self.pool.path().display(), bytes = n, "appended");
        Ok(n)
    }

    fn sync(&self) -> Result<()> {
        self.pool.lock().sync()
    }
}
