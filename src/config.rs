//! Configuration for atlasenv
//!
//! Centralized configuration with sensible defaults. Every capacity the
//! environment uses is a policy constant here rather than baked into the
//! heap or the writers.

use std::path::{Path, PathBuf};

use crate::heap::PoolOptions;

/// Main configuration for an environment instance
#[derive(Debug, Clone)]
pub struct EnvConfig {
    // -------------------------------------------------------------------------
    // Directory Registry
    // -------------------------------------------------------------------------
    /// Well-known path of the directory pool that records every data file
    /// created through the environment
    pub registry_path: PathBuf,

    /// Capacity of the directory pool (in bytes)
    pub registry_capacity: u64,

    /// Permission bits used when the directory pool is created (unix only)
    pub registry_file_mode: u32,

    // -------------------------------------------------------------------------
    // Data File Pools
    // -------------------------------------------------------------------------
    /// Capacity of each data file's pool (in bytes)
    pub pool_capacity: u64,

    /// Permission bits used when a data file pool is created (unix only)
    pub data_file_mode: u32,

    /// Largest payload committed by a single heap transaction; bigger
    /// direct writes are split across several commits
    pub max_commit_bytes: usize,

    /// fsync the pool file on every transaction commit
    pub sync_on_commit: bool,

    // -------------------------------------------------------------------------
    // Write Path
    // -------------------------------------------------------------------------
    /// Staging buffer size of each append writer (in bytes)
    pub write_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Background Work
    // -------------------------------------------------------------------------
    /// Name given to the background worker thread
    pub background_thread_name: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("./atlasenv_data/DIRECTORY"),
            registry_capacity: 64 * 1024 * 1024, // 64 MB
            registry_file_mode: 0o600,
            pool_capacity: 64 * 1024 * 1024, // 64 MB
            data_file_mode: 0o664,
            max_commit_bytes: 4 * 1024 * 1024, // 4 MB
            sync_on_commit: true,
            write_buffer_size: 64 * 1024, // 64 KB
            background_thread_name: "atlasenv-bg".to_string(),
        }
    }
}

impl EnvConfig {
    /// Create a new config builder
    pub fn builder() -> EnvConfigBuilder {
        EnvConfigBuilder::default()
    }

    /// Default config with the directory registry placed inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            registry_path: dir.as_ref().join(Self::REGISTRY_FILENAME),
            ..Self::default()
        }
    }

    /// File name of the directory pool when it lives in a database directory
    pub const REGISTRY_FILENAME: &'static str = "DIRECTORY";

    /// Pool options for data file pools
    pub fn data_pool_options(&self) -> PoolOptions {
        PoolOptions {
            capacity: self.pool_capacity,
            mode: self.data_file_mode,
            sync_on_commit: self.sync_on_commit,
        }
    }

    /// Pool options for the directory pool
    pub fn registry_pool_options(&self) -> PoolOptions {
        PoolOptions {
            capacity: self.registry_capacity,
            mode: self.registry_file_mode,
            sync_on_commit: self.sync_on_commit,
        }
    }
}

/// Builder for EnvConfig
#[derive(Default)]
pub struct EnvConfigBuilder {
    config: EnvConfig,
}

impl EnvConfigBuilder {
    /// Set the path of the directory pool
    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.registry_path = path.into();
        self
    }

    /// Set the directory pool capacity (in bytes)
    pub fn registry_capacity(mut self, bytes: u64) -> Self {
        self.config.registry_capacity = bytes;
        self
    }

    /// Set the capacity of each data file pool (in bytes)
    pub fn pool_capacity(mut self, bytes: u64) -> Self {
        self.config.pool_capacity = bytes;
        self
    }

    /// Set the permission bits for new data file pools
    pub fn data_file_mode(mut self, mode: u32) -> Self {
        self.config.data_file_mode = mode;
        self
    }

    /// Set the permission bits for a new directory pool
    pub fn registry_file_mode(mut self, mode: u32) -> Self {
        self.config.registry_file_mode = mode;
        self
    }

    /// Set the largest payload committed per transaction (in bytes)
    pub fn max_commit_bytes(mut self, bytes: usize) -> Self {
        self.config.max_commit_bytes = bytes.max(1);
        self
    }

    /// Enable or disable fsync on every commit
    pub fn sync_on_commit(mut self, sync: bool) -> Self {
        self.config.sync_on_commit = sync;
        self
    }

    /// Set the append writer staging buffer size (in bytes)
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.config.write_buffer_size = bytes.max(1);
        self
    }

    /// Set the background worker thread name
    pub fn background_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.background_thread_name = name.into();
        self
    }

    pub fn build(self) -> EnvConfig {
        self.config
    }
}
