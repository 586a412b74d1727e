//! Sequential reader
//!
//! Reads file content front to back through an implicit cursor.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{DurableFile, DurableRead};

/// Reader with an implicit cursor that only moves forward
pub struct SequentialFile<R: DurableRead = DurableFile> {
    path: PathBuf,
    file: R,
    cursor: u64,
}

impl<R: DurableRead> SequentialFile<R> {
    pub fn new(path: impl Into<PathBuf>, file: R) -> Self {
        Self {
            path: path.into(),
            file,
            cursor: 0,
        }
    }

    /// Copy up to `buf.len()` bytes from the cursor into `buf`
    ///
    /// Advances the cursor by the number of bytes returned. Returning fewer
    /// bytes than requested (including 0) means end of content, not an
    /// error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.file.read_at(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }

    /// Advance the cursor by `n` bytes without copying, stopping at the end
    /// of content
    pub fn skip(&mut self, n: u64) -> Result<()> {
        let len = self.file.len()?;
        self.cursor = self.cursor.saturating_add(n).min(len).max(self.cursor);
        Ok(())
    }

    /// Current cursor position
    pub fn position(&self) -> u64 {
        self.cursor
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

impl<R: DurableRead> io::Read for SequentialFile<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SequentialFile::read(self, buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl<R: DurableRead> std::fmt::Debug for SequentialFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
