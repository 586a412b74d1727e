//! # atlasenv
//!
//! The storage environment beneath an embedded LSM database:
//! - Data files kept in transactional durable heaps ("pools")
//! - Crash-consistent appends: a crash never leaves a torn write
//! - A durable directory registry of every data file created
//! - FIFO background work on a single worker thread
//! - Process-local advisory file locks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Upper layers (LSM engine)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                          Env                                 │
//! │     files · registry · locks · background · fs pass-through  │
//! └──────┬───────────────────────┬──────────────────┬───────────┘
//!        │                       │                  │
//!        ▼                       ▼                  ▼
//!  ┌─────────────┐       ┌──────────────┐    ┌─────────────┐
//!  │    File     │       │  Directory   │    │  TaskQueue  │
//!  │ seq/rand/wr │       │  Registry    │    │  (worker)   │
//!  └──────┬──────┘       └──────┬───────┘    └─────────────┘
//!         │                     │
//!         ▼                     ▼
//!  ┌─────────────┐       ┌──────────────┐
//!  │ PoolManager │──────▶│     Heap     │
//!  │ (refcounted)│       │ (tx log pool)│
//!  └─────────────┘       └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod background;
pub mod env;
pub mod file;
pub mod heap;
pub mod lock;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::EnvConfig;
pub use env::Env;
pub use error::{EnvError, Result};
pub use file::{RandomAccessFile, SequentialFile, WritableFile};
pub use lock::FileLock;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of atlasenv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
