//! Heap records
//!
//! Durable references, the operations a transaction is made of, and the
//! binary encoding of pool headers and transaction records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// =============================================================================
// Format Constants
// =============================================================================

/// Magic bytes identifying a pool file
pub const MAGIC: &[u8; 8] = b"ATLSHEAP";

/// Current pool format version
pub const FORMAT_VERSION: u16 = 1;

/// Header size: fixed 64 bytes at the start of every pool file
pub const HEADER_SIZE: u64 = 64;

/// Record header: PayloadLen (4) + CRC (4) = 8 bytes
pub const RECORD_HEADER_SIZE: u64 = 8;

/// Bytes reserved for the layout tag in the header
const LAYOUT_TAG_LEN: usize = 16;

// Header field offsets
const VERSION_OFFSET: usize = 8;
const TAG_OFFSET: usize = 10;
const CAPACITY_OFFSET: usize = TAG_OFFSET + LAYOUT_TAG_LEN;
const POOL_ID_OFFSET: usize = CAPACITY_OFFSET + 8;
const HEADER_CRC_OFFSET: usize = HEADER_SIZE as usize - 4;

// =============================================================================
// Durable References
// =============================================================================

/// Durable reference to an object, valid only within the pool that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjRef(pub(crate) u64);

impl ObjRef {
    /// Numeric object id inside its pool
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// What a heap object holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// The pool's single root descriptor
    Root,
    /// Growable byte content
    Bytes,
    /// Append-only set of references into other pools
    RefSet,
}

/// Reference to an object living in another pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRef {
    /// Path the referenced pool was created at
    pub path: PathBuf,
    /// Id of the referenced pool
    pub pool_id: u64,
    /// Object inside the referenced pool
    pub object: ObjRef,
}

/// One durable mutation; a committed record is a list of these
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapOp {
    Alloc { obj: ObjRef, kind: ObjectKind },
    Free { obj: ObjRef },
    SetChild { root: ObjRef, child: Option<ObjRef> },
    Append { obj: ObjRef, data: Vec<u8> },
    PushRef { obj: ObjRef, entry: PoolRef },
}

// =============================================================================
// Pool Layout
// =============================================================================

/// Kind tag stored in the pool header; opening a pool with the wrong
/// layout is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolLayout {
    /// A data file pool, whose root points at file content
    File,
    /// The directory pool, whose root points at the entry set
    Directory,
}

impl PoolLayout {
    pub fn tag(&self) -> &'static str {
        match self {
            PoolLayout::File => "file",
            PoolLayout::Directory => "directory",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "file" => Some(PoolLayout::File),
            "directory" => Some(PoolLayout::Directory),
            _ => None,
        }
    }
}

// =============================================================================
// Pool Header
// =============================================================================

/// Decoded pool header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHeader {
    pub layout: PoolLayout,
    pub capacity: u64,
    pub pool_id: u64,
}

impl PoolHeader {
    /// Encode into the fixed 64-byte header block
    ///
    /// ```text
    /// ┌───────────┬─────────────┬──────────┬──────────────┬─────────────┬──────────┬─────────┐
    /// │ Magic (8) │ Version (2) │ Tag (16) │ Capacity (8) │ PoolId (8)  │ Reserved │ CRC (4) │
    /// └───────────┴─────────────┴──────────┴──────────────┴─────────────┴──────────┴─────────┘
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..8].copy_from_slice(MAGIC);
        buf[VERSION_OFFSET..TAG_OFFSET].copy_from_slice(&FORMAT_VERSION.to_le_bytes());

        let tag = self.layout.tag().as_bytes();
        buf[TAG_OFFSET..TAG_OFFSET + tag.len()].copy_from_slice(tag);

        buf[CAPACITY_OFFSET..POOL_ID_OFFSET].copy_from_slice(&self.capacity.to_le_bytes());
        buf[POOL_ID_OFFSET..POOL_ID_OFFSET + 8].copy_from_slice(&self.pool_id.to_le_bytes());

        let crc = crc32fast::hash(&buf[..HEADER_CRC_OFFSET]);
        buf[HEADER_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decode and validate a header block; the error is a human readable
    /// reason the bytes are not a pool header
    pub fn decode(buf: &[u8]) -> std::result::Result<Self, String> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(format!(
                "not a pool: {} bytes is smaller than the {} byte header",
                buf.len(),
                HEADER_SIZE
            ));
        }

        if &buf[0..8] != MAGIC {
            return Err("not a pool: bad magic".to_string());
        }

        let stored_crc = read_u32(buf, HEADER_CRC_OFFSET);
        if crc32fast::hash(&buf[..HEADER_CRC_OFFSET]) != stored_crc {
            return Err("pool header checksum mismatch".to_string());
        }

        let version = u16::from_le_bytes([buf[VERSION_OFFSET], buf[VERSION_OFFSET + 1]]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported pool version: {}", version));
        }

        let raw_tag = &buf[TAG_OFFSET..CAPACITY_OFFSET];
        let tag_len = raw_tag.iter().position(|&b| b == 0).unwrap_or(LAYOUT_TAG_LEN);
        let tag = String::from_utf8_lossy(&raw_tag[..tag_len]);
        let layout = PoolLayout::from_tag(&tag)
            .ok_or_else(|| format!("unknown pool layout: {:?}", tag))?;

        Ok(Self {
            layout,
            capacity: read_u64(buf, CAPACITY_OFFSET),
            pool_id: read_u64(buf, POOL_ID_OFFSET),
        })
    }
}

// =============================================================================
// Transaction Records
// =============================================================================

/// Outcome of decoding the record at the front of a byte slice
#[derive(Debug)]
pub enum RecordRead {
    /// No bytes left
    End,
    /// A complete, checksummed record and its total encoded size
    Complete { ops: Vec<HeapOp>, size: usize },
    /// A truncated record or one whose checksum does not match: a write
    /// that never finished
    Torn,
    /// The checksum matched but the payload does not decode
    Undecodable(String),
}

/// Encode one transaction's ops as a record
///
/// Format: payload_len (4) + crc32(payload) (4) + bincode(ops)
pub fn encode_record(ops: &[HeapOp]) -> std::result::Result<Vec<u8>, String> {
    let payload = bincode::serialize(ops).map_err(|e| e.to_string())?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| format!("record payload of {} bytes is too large", payload.len()))?;

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE as usize + payload.len());
    record.extend_from_slice(&payload_len.to_le_bytes());
    record.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Decode the record at the front of `bytes`
pub fn decode_record(bytes: &[u8]) -> RecordRead {
    if bytes.is_empty() {
        return RecordRead::End;
    }
    if bytes.len() < RECORD_HEADER_SIZE as usize {
        return RecordRead::Torn;
    }

    let payload_len = read_u32(bytes, 0) as usize;
    let stored_crc = read_u32(bytes, 4);

    let size = RECORD_HEADER_SIZE as usize + payload_len;
    if bytes.len() < size {
        return RecordRead::Torn;
    }

    let payload = &bytes[RECORD_HEADER_SIZE as usize..size];
    if crc32fast::hash(payload) != stored_crc {
        return RecordRead::Torn;
    }

    match bincode::deserialize::<Vec<HeapOp>>(payload) {
        Ok(ops) => RecordRead::Complete { ops, size },
        Err(e) => RecordRead::Undecodable(e.to_string()),
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(out)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(out)
}
