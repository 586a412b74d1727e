//! Buffered append writer
//!
//! Appends are staged in a fixed-capacity buffer and committed to the
//! pool when the buffer overflows, or on `flush`, `sync` and `close`.
//! Writes at least as large as the buffer bypass it.

use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::{EnvError, Result};

use super::{DurableAppend, DurableFile};

/// Append-only writer with a staging buffer
///
/// One handle means one writer: every method takes `&mut self`.
pub struct WritableFile<A: DurableAppend = DurableFile> {
    path: PathBuf,
    /// `None` once closed
    file: Option<A>,
    buf: BytesMut,
    capacity: usize,
}

impl<A: DurableAppend> WritableFile<A> {
    pub fn new(path: impl Into<PathBuf>, file: A, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            path: path.into(),
            file: Some(file),
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `data`
    ///
    /// Fills the buffer first. If bytes remain, the buffer is flushed and
    /// the remainder is either buffered (if smaller than the buffer) or
    /// written straight through.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let copy = data.len().min(self.capacity - self.buf.len());
        self.buf.extend_from_slice(&data[..copy]);
        let rest = &data[copy..];
        if rest.is_empty() {
            return Ok(());
        }

        // Can't fit in the buffer, so at least one write is needed
        self.flush_buffered()?;

        if rest.len() < self.capacity {
            self.buf.extend_from_slice(rest);
            return Ok(());
        }
        match &self.file {
            Some(file) => Self::write_raw(file, &self.path, rest),
            None => Err(self.closed()),
        }
    }

    /// Commit buffered bytes to the pool
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_buffered()
    }

    /// Flush, then make the pool's committed state durable
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.is_manifest() {
            // Pool commits are durable on their own; no directory fsync needed
            tracing::trace!(path = %self.path.display(), "manifest sync");
        }
        self.flush_buffered()?;
        match &self.file {
            Some(file) => file.sync(),
            None => Err(self.closed()),
        }
    }

    /// Flush and release the pool handle
    ///
    /// The handle is released even if the flush fails. Closing twice is a
    /// no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        let result = self.flush_buffered();
        self.file = None;
        tracing::debug!(path = %self.path.display(), "closed writable file");
        result
    }

    /// Bytes currently staged in the buffer
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Staging buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write out the buffer. The buffer is emptied whether or not the
    /// write succeeds.
    fn flush_buffered(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = match &self.file {
            Some(file) => Self::write_raw(file, &self.path, &self.buf),
            None => Err(self.closed()),
        };
        self.buf.clear();
        result
    }

    /// Write all of `data`, retrying interrupted appends and re-issuing
    /// only the unwritten remainder after partial ones
    fn write_raw(file: &A, path: &Path, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match file.append(data) {
                Ok(0) => {
                    return Err(EnvError::io(
                        path,
                        std::io::ErrorKind::WriteZero,
                        "append committed no bytes",
                    ));
                }
                Ok(n) => data = &data[n..],
                Err(e) if e.is_interrupted() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn is_manifest(&self) -> bool {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with("MANIFEST"))
            .unwrap_or(false)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(self.closed());
        }
        Ok(())
    }

    fn closed(&self) -> EnvError {
        EnvError::Closed {
            path: self.path.clone(),
        }
    }
}

impl<A: DurableAppend> Drop for WritableFile<A> {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(e) = self.close() {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to flush file on drop");
            }
        }
    }
}

impl<A: DurableAppend> std::fmt::Debug for WritableFile<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritableFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
