use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::CciError;

pub const MAGIC: u32 = 0x4D49_4343;
pub const HEADER_SIZE: u32 = 32;
pub const BLOCK_SIZE: u32 = 2048;
pub const VERSION: u8 = 1;
pub const INDEX_ALIGNMENT: u8 = 2;

/// The 32-byte volume header.  `uncompressed_size` and `index_offset` are
/// zero until the volume is finalized and the header patched in place.
#[derive(Debug, Clone)]
pub struct CciHeader {
    pub magic: u32,
    pub header_size: u32,
    pub uncompressed_size: u64,
    pub index_offset: u64,
    pub block_size: u32,
    pub version: u8,
    pub index_alignment: u8,
}

impl CciHeader {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            header_size: HEADER_SIZE,
            uncompressed_size: 0,
            index_offset: 0,
            block_size: BLOCK_SIZE,
            version: VERSION,
            index_alignment: INDEX_ALIGNMENT,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u32::<LittleEndian>(self.header_size)?;
        writer.write_u64::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u32::<LittleEndian>(self.block_size)?;
        writer.write_u8(self.version)?;
        writer.write_u8(self.index_alignment)?;
        writer.write_u16::<LittleEndian>(0)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, CciError> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(CciError::InvalidMagic);
        }
        let header_size = reader.read_u32::<LittleEndian>()?;
        if header_size != HEADER_SIZE {
            return Err(CciError::UnsupportedHeaderSize(header_size));
        }
        let uncompressed_size = reader.read_u64::<LittleEndian>()?;
        let index_offset = reader.read_u64::<LittleEndian>()?;
        let block_size = reader.read_u32::<LittleEndian>()?;
        if block_size != BLOCK_SIZE {
            return Err(CciError::UnsupportedBlockSize(block_size));
        }
        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(CciError::UnsupportedVersion(version));
        }
        let index_alignment = reader.read_u8()?;
        if index_alignment != INDEX_ALIGNMENT {
            return Err(CciError::UnsupportedIndexAlignment(index_alignment));
        }
        let _reserved = reader.read_u16::<LittleEndian>()?;
        Ok(Self {
            magic,
            header_size,
            uncompressed_size,
            index_offset,
            block_size,
            version,
            index_alignment,
        })
    }

    /// Number of data blocks the volume holds.
    pub fn entry_count(&self) -> u64 {
        self.uncompressed_size / self.block_size as u64
    }
}
