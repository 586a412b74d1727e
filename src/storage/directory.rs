//! Directory Registry
//!
//! The one well-known pool recording every data file created through the
//! environment. Its root points at a reference set; each entry references
//! the root descriptor of one data file's pool.
//!
//! Entries are an append-only creation log: deleting or renaming a file
//! does not remove its entry.

use std::path::{Path, PathBuf};

use crate::error::{EnvError, Result};
use crate::heap::{ObjRef, ObjectKind, Pool, PoolLayout, PoolOptions, PoolRef};

/// Durable registry of created data files
pub struct DirectoryRegistry {
    pool: Pool,
    /// The reference set hanging off the pool's root
    entry_set: ObjRef,
}

impl DirectoryRegistry {
    /// Open the registry at `path`, creating it if absent
    ///
    /// A fresh registry gets its root descriptor and an empty entry set in
    /// a single transaction.
    pub fn open(path: &Path, options: &PoolOptions) -> Result<Self> {
        if !path.exists() {
            let mut entry_set = None;
            let pool = Pool::create_with(path, PoolLayout::Directory, options, |tx, root| {
                let set = tx.allocate(ObjectKind::RefSet)?;
                tx.set_child(root, Some(set))?;
                entry_set = Some(set);
                Ok(())
            })?;
            let entry_set = entry_set.ok_or_else(|| missing_entry_set(path))?;

            tracing::info!(path = %path.display(), "created directory registry");
            return Ok(Self { pool, entry_set });
        }

        let mut pool = Pool::open(path, PoolLayout::Directory, options)?;
        let root = pool.root();
        let entry_set = match pool.child(root)? {
            Some(set) => set,
            // Left behind by a crash before the entry set was linked
            None => pool.transaction(|tx| {
                let set = tx.allocate(ObjectKind::RefSet)?;
                tx.set_child(root, Some(set))?;
                Ok(set)
            })?,
        };

        let registry = Self { pool, entry_set };
        tracing::debug!(
            path = %path.display(),
            entries = registry.len(),
            "opened directory registry"
        );
        Ok(registry)
    }

    /// Open an existing registry without writing to it
    ///
    /// `register` fails on a registry opened this way.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let pool = Pool::open_read_only(path, PoolLayout::Directory)?;
        let entry_set = pool
            .child(pool.root())?
            .ok_or_else(|| missing_entry_set(path))?;
        Ok(Self { pool, entry_set })
    }

    /// Record a newly created data file
    ///
    /// `pool_id` and `root` identify the file's pool and its root
    /// descriptor.
    pub fn register(&mut self, path: &Path, pool_id: u64, root: ObjRef) -> Result<()> {
        let entry = PoolRef {
            path: path.to_path_buf(),
            pool_id,
            object: root,
        };
        let set = self.entry_set;
        self.pool.transaction(|tx| tx.push_ref(set, entry))?;

        tracing::debug!(path = %path.display(), pool_id, "registered data file");
        Ok(())
    }

    /// All entries in creation order
    pub fn entries(&self) -> Result<Vec<PoolRef>> {
        Ok(self.pool.refs(self.entry_set)?.to_vec())
    }

    /// Paths of all entries in creation order
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .pool
            .refs(self.entry_set)?
            .iter()
            .map(|entry| entry.path.clone())
            .collect())
    }

    /// Whether a file created at `path` has been recorded
    pub fn contains(&self, path: &Path) -> bool {
        self.pool
            .refs(self.entry_set)
            .map(|refs| refs.iter().any(|entry| entry.path == path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.pool
            .refs(self.entry_set)
            .map(|refs| refs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the directory pool
    pub fn path(&self) -> &Path {
        self.pool.path()
    }

    /// Sync and close the directory pool
    pub fn close(self) -> Result<()> {
        self.pool.close()
    }
}

fn missing_entry_set(path: &Path) -> EnvError {
    EnvError::Corruption {
        path: path.to_path_buf(),
        reason: "registry has no entry set".to_string(),
    }
}
