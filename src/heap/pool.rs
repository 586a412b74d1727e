//! Pool
//!
//! One file-backed durable heap: header, root descriptor, object table and
//! the transaction log that makes every mutation atomic.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{EnvError, Result};

use super::object::HeapState;
use super::record::{
    decode_record, encode_record, HeapOp, ObjRef, ObjectKind, PoolHeader, PoolLayout, PoolRef,
    RecordRead, HEADER_SIZE,
};
use super::transaction::Transaction;

/// Options applied when a pool is created or opened
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Maximum size of the pool file (in bytes)
    pub capacity: u64,
    /// Permission bits for a newly created pool file (unix only)
    pub mode: u32,
    /// fsync after every committed transaction
    pub sync_on_commit: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024 * 1024, // 64 MB
            mode: 0o600,
            sync_on_commit: true,
        }
    }
}

/// Snapshot of a pool's bookkeeping, for inspection
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub layout: PoolLayout,
    pub pool_id: u64,
    pub capacity: u64,
    pub used_bytes: u64,
    pub object_count: usize,
    pub root_child: Option<ObjRef>,
}

/// An open durable heap
///
/// Exclusively owns its file. Dropping the pool closes it; the file itself
/// is only removed by deleting it from the filesystem.
pub struct Pool {
    path: PathBuf,
    file: File,
    header: PoolHeader,
    root: ObjRef,
    /// Bytes of the pool file holding committed data
    len: u64,
    state: HeapState,
    sync_on_commit: bool,
    /// Committed records not yet fsynced
    dirty: bool,
    /// Opened for inspection only
    read_only: bool,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("path", &self.path)
            .field("root", &self.root)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Create a new pool at `path` and allocate its root descriptor
    ///
    /// Fails if anything already exists at `path`.
    pub fn create(path: &Path, layout: PoolLayout, options: &PoolOptions) -> Result<Self> {
        Self::create_with(path, layout, options, |_, _| Ok(()))
    }

    /// Create a new pool whose root descriptor and initial objects are
    /// allocated by a single transaction
    ///
    /// `init` receives the staged root. If any step fails, the partially
    /// written file is removed again.
    pub fn create_with<F>(
        path: &Path,
        layout: PoolLayout,
        options: &PoolOptions,
        init: F,
    ) -> Result<Self>
    where
        F: FnOnce(&mut Transaction<'_>, ObjRef) -> Result<()>,
    {
        let minimum = minimum_capacity()?;
        if options.capacity < minimum {
            return Err(EnvError::io(
                path,
                io::ErrorKind::InvalidInput,
                format!(
                    "pool capacity {} is below the minimum of {} bytes",
                    options.capacity, minimum
                ),
            ));
        }

        let mut open = OpenOptions::new();
        open.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open.mode(options.mode);
        }
        let file = open.open(path).map_err(|e| EnvError::from_io(path, e))?;

        let header = PoolHeader {
            layout,
            capacity: options.capacity,
            pool_id: generate_pool_id(),
        };
        let pool = match Self::initialize(path, file, header, options, init) {
            Ok(pool) => pool,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove half-created pool");
                }
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            layout = layout.tag(),
            capacity = options.capacity,
            pool_id = header.pool_id,
            "created pool"
        );
        Ok(pool)
    }

    /// Open an existing pool, replaying its transaction log
    ///
    /// A torn record at the tail (an interrupted commit) is cut off; a
    /// record that is intact but inconsistent is reported as corruption.
    pub fn open(path: &Path, layout: PoolLayout, options: &PoolOptions) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| EnvError::from_io(path, e))?;

        let mut pool = Self::load(path, file, layout, options, false)?;
        // A crash between header write and root allocation leaves a pool
        // without a root; its first use allocates one.
        pool.ensure_root()?;
        Ok(pool)
    }

    /// Open an existing pool for inspection
    ///
    /// Nothing is written: a torn tail is skipped rather than cut off, a
    /// missing root is not allocated, and transactions are refused.
    pub fn open_read_only(path: &Path, layout: PoolLayout) -> Result<Self> {
        let file = File::open(path).map_err(|e| EnvError::from_io(path, e))?;
        let mut pool = Self::load(path, file, layout, &PoolOptions::default(), true)?;
        if let Some(root) = pool.state.root() {
            pool.root = root;
        }
        Ok(pool)
    }

    /// Open the pool at `path`, creating it if nothing exists there
    ///
    /// Returns the pool and whether it was created by this call.
    pub fn open_or_create(
        path: &Path,
        layout: PoolLayout,
        options: &PoolOptions,
    ) -> Result<(Self, bool)> {
        if path.exists() {
            Ok((Self::open(path, layout, options)?, false))
        } else {
            Ok((Self::create(path, layout, options)?, true))
        }
    }

    /// Read only the header of the pool at `path`
    pub fn read_header(path: &Path) -> Result<PoolHeader> {
        let mut file = File::open(path).map_err(|e| EnvError::from_io(path, e))?;
        let mut buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                EnvError::io(path, io::ErrorKind::InvalidData, "not a pool: file too small")
            }
            _ => EnvError::from_io(path, e),
        })?;
        PoolHeader::decode(&buf)
            .map_err(|reason| EnvError::io(path, io::ErrorKind::InvalidData, reason))
    }

    /// Run `body` as one atomic transaction
    ///
    /// If `body` fails nothing is written. Otherwise its ops are appended
    /// as a single checksummed record and applied to the object table.
    pub fn transaction<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        if self.read_only {
            return Err(EnvError::PermissionDenied {
                path: self.path.clone(),
            });
        }

        let mut tx = Transaction::new(&self.path, &self.state);
        let value = body(&mut tx)?;
        let ops = tx.into_ops();
        if ops.is_empty() {
            return Ok(value);
        }

        let record = encode_record(&ops).map_err(EnvError::Serialization)?;
        let new_len = self.len + record.len() as u64;
        if new_len > self.header.capacity {
            return Err(EnvError::PoolFull {
                path: self.path.clone(),
                capacity: self.header.capacity,
            });
        }

        if let Err(e) = self.write_record(&record) {
            // Cut off whatever part of the record made it out
            let _ = self.file.set_len(self.len);
            return Err(EnvError::from_io(&self.path, e));
        }
        self.len = new_len;

        for op in ops {
            self.state.apply(op).map_err(|reason| EnvError::Corruption {
                path: self.path.clone(),
                reason,
            })?;
        }

        tracing::trace!(path = %self.path.display(), bytes = record.len(), "committed transaction");
        Ok(value)
    }

    /// fsync commits that were not synced when they were made
    pub fn sync(&mut self) -> Result<()> {
        if self.dirty {
            self.file
                .sync_data()
                .map_err(|e| EnvError::from_io(&self.path, e))?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Sync and close the pool
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> PoolLayout {
        self.header.layout
    }

    pub fn pool_id(&self) -> u64 {
        self.header.pool_id
    }

    pub fn capacity(&self) -> u64 {
        self.header.capacity
    }

    /// Bytes of the pool file in use (header plus committed records)
    pub fn used_bytes(&self) -> u64 {
        self.len
    }

    /// The pool's root descriptor
    pub fn root(&self) -> ObjRef {
        self.root
    }

    /// Child of a root descriptor
    pub fn child(&self, root: ObjRef) -> Result<Option<ObjRef>> {
        self.state
            .child(root)
            .ok_or_else(|| self.invalid(format!("object {} is not a root", root.id())))
    }

    /// Committed content of a byte object
    pub fn bytes(&self, obj: ObjRef) -> Result<&[u8]> {
        self.state
            .bytes(obj)
            .ok_or_else(|| self.invalid(format!("object {} is not byte content", obj.id())))
    }

    /// Committed entries of a reference set
    pub fn refs(&self, obj: ObjRef) -> Result<&[PoolRef]> {
        self.state
            .refs(obj)
            .ok_or_else(|| self.invalid(format!("object {} is not a reference set", obj.id())))
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            layout: self.header.layout,
            pool_id: self.header.pool_id,
            capacity: self.header.capacity,
            used_bytes: self.len,
            object_count: self.state.object_count(),
            root_child: self.state.child(self.root).flatten(),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn from_parts(
        path: &Path,
        file: File,
        header: PoolHeader,
        len: u64,
        state: HeapState,
        options: &PoolOptions,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            header,
            root: ObjRef(0),
            len,
            state,
            sync_on_commit: options.sync_on_commit,
            dirty: false,
            read_only: false,
        }
    }

    /// Write the header of a freshly created file, then commit the root
    /// descriptor together with whatever `init` stages
    fn initialize<F>(
        path: &Path,
        mut file: File,
        header: PoolHeader,
        options: &PoolOptions,
        init: F,
    ) -> Result<Self>
    where
        F: FnOnce(&mut Transaction<'_>, ObjRef) -> Result<()>,
    {
        file.write_all(&header.encode())
            .and_then(|_| file.sync_all())
            .map_err(|e| EnvError::from_io(path, e))?;

        let mut pool =
            Self::from_parts(path, file, header, HEADER_SIZE, HeapState::default(), options);
        pool.root = pool.transaction(|tx| {
            let root = tx.allocate(ObjectKind::Root)?;
            init(tx, root)?;
            Ok(root)
        })?;
        Ok(pool)
    }

    /// Validate the header and rebuild the object table from the log
    fn load(
        path: &Path,
        mut file: File,
        layout: PoolLayout,
        options: &PoolOptions,
        read_only: bool,
    ) -> Result<Self> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| EnvError::from_io(path, e))?;

        let header = PoolHeader::decode(&bytes)
            .map_err(|reason| EnvError::io(path, io::ErrorKind::InvalidData, reason))?;
        if header.layout != layout {
            return Err(EnvError::io(
                path,
                io::ErrorKind::InvalidData,
                format!(
                    "pool layout mismatch: expected {:?}, found {:?}",
                    layout.tag(),
                    header.layout.tag()
                ),
            ));
        }

        let mut state = HeapState::default();
        let mut offset = HEADER_SIZE as usize;
        let mut records = 0u64;
        loop {
            match decode_record(&bytes[offset..]) {
                RecordRead::End => break,
                RecordRead::Complete { ops, size } => {
                    for op in ops {
                        state.apply(op).map_err(|reason| EnvError::Corruption {
                            path: path.to_path_buf(),
                            reason: format!("record at offset {}: {}", offset, reason),
                        })?;
                    }
                    offset += size;
                    records += 1;
                }
                RecordRead::Torn if read_only => {
                    tracing::warn!(
                        path = %path.display(),
                        offset,
                        ignored = bytes.len() - offset,
                        "ignoring torn transaction record"
                    );
                    break;
                }
                RecordRead::Torn => {
                    tracing::warn!(
                        path = %path.display(),
                        offset,
                        discarded = bytes.len() - offset,
                        "discarding torn transaction record"
                    );
                    file.set_len(offset as u64)
                        .and_then(|_| file.sync_all())
                        .map_err(|e| EnvError::from_io(path, e))?;
                    break;
                }
                RecordRead::Undecodable(reason) => {
                    return Err(EnvError::Corruption {
                        path: path.to_path_buf(),
                        reason: format!("record at offset {}: {}", offset, reason),
                    });
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            layout = layout.tag(),
            records,
            objects = state.object_count(),
            read_only,
            "opened pool"
        );

        let mut pool = Self::from_parts(path, file, header, offset as u64, state, options);
        pool.read_only = read_only;
        Ok(pool)
    }

    /// Allocate the root descriptor if the pool has none yet
    fn ensure_root(&mut self) -> Result<()> {
        self.root = match self.state.root() {
            Some(root) => root,
            None => self.transaction(|tx| tx.allocate(ObjectKind::Root))?,
        };
        Ok(())
    }

    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(record)?;
        if self.sync_on_commit {
            self.file.sync_data()?;
        } else {
            self.dirty = true;
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> EnvError {
        EnvError::InvalidReference {
            path: self.path.clone(),
            reason,
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.file.sync_data() {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to sync pool on close");
            }
        }
        tracing::debug!(path = %self.path.display(), "closed pool");
    }
}

/// Smallest capacity that holds the header and the root allocation
fn minimum_capacity() -> Result<u64> {
    let root = encode_record(&[HeapOp::Alloc {
        obj: ObjRef(0),
        kind: ObjectKind::Root,
    }])
    .map_err(EnvError::Serialization)?;
    Ok(HEADER_SIZE + root.len() as u64)
}

/// Id stamped into a new pool's header; distinguishes pools created at
/// the same path over time
fn generate_pool_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);

    nanos ^ (u64::from(std::process::id()) << 32) ^ seq.rotate_left(48)
}
