//! Error types for atlasenv
//!
//! Provides a unified error type for all environment operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using EnvError
pub type Result<T> = std::result::Result<T, EnvError>;

/// Unified error type for environment operations
#[derive(Debug, Error)]
pub enum EnvError {
    // -------------------------------------------------------------------------
    // Path Errors (mapped from the OS error kind)
    // -------------------------------------------------------------------------
    #[error("{}: not found", path.display())]
    NotFound { path: PathBuf },

    #[error("{}: already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("{}: permission denied", path.display())]
    PermissionDenied { path: PathBuf },

    /// Generic OS or heap failure. The OS error code, when there is one,
    /// is available through [`EnvError::os_error_code`].
    #[error("{}: IO error: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // Lock Errors
    // -------------------------------------------------------------------------
    #[error("lock {}: already held by process", path.display())]
    AlreadyLocked { path: PathBuf },

    // -------------------------------------------------------------------------
    // Heap Errors
    // -------------------------------------------------------------------------
    #[error("{}: heap corruption: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    #[error("{}: invalid durable reference: {reason}", path.display())]
    InvalidReference { path: PathBuf, reason: String },

    #[error("{}: pool capacity of {capacity} bytes exhausted", path.display())]
    PoolFull { path: PathBuf, capacity: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("{}: file already closed", path.display())]
    Closed { path: PathBuf },

    #[error("environment is shut down")]
    ShutDown,

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[source] io::Error),
}

impl EnvError {
    /// Map an OS error for `path` onto the matching variant.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => EnvError::NotFound { path },
            io::ErrorKind::AlreadyExists => EnvError::AlreadyExists { path },
            io::ErrorKind::PermissionDenied => EnvError::PermissionDenied { path },
            _ => EnvError::Io { path, source: err },
        }
    }

    /// Build an `Io` error that is not backed by an OS error code.
    pub fn io(path: impl AsRef<Path>, kind: io::ErrorKind, msg: impl Into<String>) -> Self {
        EnvError::Io {
            path: path.as_ref().to_path_buf(),
            source: io::Error::new(kind, msg.into()),
        }
    }

    /// The raw OS error code, if this error came from a syscall.
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            EnvError::Io { source, .. } | EnvError::ThreadSpawn(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// Whether the failed operation may simply be retried.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, EnvError::Io { source, .. } if source.kind() == io::ErrorKind::Interrupted)
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EnvError::NotFound { .. })
    }
}
