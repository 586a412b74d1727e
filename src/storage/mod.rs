//! Storage Module
//!
//! Pool lifecycle for data files and the durable directory registry.
//!
//! ## Responsibilities
//! - Open or create one pool per data file path
//! - Share one mapping between all handles to a path (reference counted)
//! - Record every created data file in the directory registry
//!
//! ## Layout
//! ```text
//! {db_dir}/
//!   ├── 000005.log       (file pool: root → file content)
//!   ├── 000007.ldb       (file pool: root → file content)
//!   └── DIRECTORY        (directory pool: root → entry set)
//!                              │
//!                              ├── ref → 000005.log root
//!                              └── ref → 000007.ldb root
//! ```

mod directory;
mod manager;

pub use directory::DirectoryRegistry;
pub use manager::{PoolHandle, PoolManager, SharedPool};
