//! CCI compressed container format.
//!
//! A container volume is a 32-byte header, a run of per-sector blocks
//! (LZ4-compressed where that wins, raw otherwise), and a packed index
//! table locating every block.  Images larger than the split threshold are
//! written as multiple volumes.

pub mod decode;
pub mod encode;
pub mod header;
pub mod index;

pub use decode::decode_container;
pub use encode::encode_container;
pub use header::CciHeader;
pub use index::IndexEntry;

use std::io;
use thiserror::Error;

/// Everything that can go wrong reading or writing a container.  All
/// variants except `Io` mean the container itself is malformed.
#[derive(Error, Debug)]
pub enum CciError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported header size: {0}")]
    UnsupportedHeaderSize(u32),
    #[error("Unsupported block size: {0}")]
    UnsupportedBlockSize(u32),
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("Unsupported index alignment: {0}")]
    UnsupportedIndexAlignment(u8),
    #[error("Corrupt block at sector {sector}")]
    CorruptBlock { sector: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CciError {
    /// True when the failure means the container is malformed rather than
    /// the I/O layer failing.
    pub fn is_invalid_container(&self) -> bool {
        !matches!(self, CciError::Io(_))
    }
}
