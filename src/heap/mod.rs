//! Durable Heap Module
//!
//! A file-backed transactional object heap ("pool"). Data files and the
//! directory registry each live in their own pool.
//!
//! ## Responsibilities
//! - One root descriptor per pool, allocated transactionally on first use
//! - Allocate / free durable objects, addressed by `ObjRef`
//! - Atomic multi-op transactions: a crash leaves a transaction either
//!   fully applied or absent
//! - Crash recovery by log replay, cutting off torn tail records
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (64 bytes)                       │
//! │  Magic | Version | Layout | Capacity    │
//! │  PoolId | Reserved | CRC                │
//! ├─────────────────────────────────────────┤
//! │ Transaction 1                           │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode(ops)    │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Transaction 2 ...                       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The object table is kept in memory and rebuilt from the log on open,
//! so a pool never holds more than its configured capacity.

mod object;
mod pool;
mod record;
mod transaction;

pub use pool::{Pool, PoolOptions, PoolStats};
pub use record::{
    decode_record, encode_record, HeapOp, ObjRef, ObjectKind, PoolHeader, PoolLayout, PoolRef,
    RecordRead, HEADER_SIZE, RECORD_HEADER_SIZE,
};
pub use transaction::Transaction;
