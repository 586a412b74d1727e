//! Random access reader

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{DurableFile, DurableRead};

/// Stateless positional reader
///
/// Unlike the sequential reader, failures never surface: an out-of-range
/// offset or a failed read yields zero bytes.
pub struct RandomAccessFile<R: DurableRead = DurableFile> {
    path: PathBuf,
    file: R,
}

impl<R: DurableRead> RandomAccessFile<R> {
    pub fn new(path: impl Into<PathBuf>, file: R) -> Self {
        Self {
            path: path.into(),
            file,
        }
    }

    /// Copy up to `buf.len()` bytes starting at `offset` into `buf`
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        match self.file.read_at(offset, buf) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    offset,
                    len = buf.len(),
                    error = %e,
                    "random read failed, returning no data"
                );
                0
            }
        }
    }

    /// Content length in bytes
    pub fn len(&self) -> Result<u64> {
        self.file.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.file.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: DurableRead> std::fmt::Debug for RandomAccessFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
