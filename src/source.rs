//! Random-access view over a disc image.
//!
//! `SectorSource` is the seam toward backing stores: a flat file, a memory
//! buffer, or anything else that can serve 2048-byte sectors.  All multi-byte
//! integers on an Xbox DVD are little-endian; the provided readers decode
//! them in place so implementors only supply raw byte access.

use std::io;

use byteorder::{ByteOrder, LittleEndian};

use crate::disc::{REDUMP_SECTORS, SECTOR_SHIFT, SECTOR_SIZE, VIDEO_SECTORS};

pub trait SectorSource {
    /// Index of the first game-partition sector: 0 for an extracted XISO,
    /// `VIDEO_SECTORS` when the image carries a video partition.
    fn sector_offset(&self) -> u32;

    /// Total sector count of the backing image.
    fn total_sectors(&self) -> u32;

    /// Fill `buf` from the absolute byte `position`.
    fn read_bytes(&mut self, position: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Which physical slice holds `sector`.  Single-file sources live in
    /// slice 0.
    fn sector_in_slice(&self, _sector: u32) -> u32 {
        0
    }

    /// Read one full sector by absolute index.
    fn read_sector(&mut self, sector: u32, buf: &mut [u8]) -> io::Result<()> {
        self.read_bytes((sector as u64) << SECTOR_SHIFT, buf)
    }

    fn read_byte(&mut self, position: u64) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(position, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, position: u64) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(position, &mut buf)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    fn read_u32(&mut self, position: u64) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(position, &mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }
}

/// Whole image held in memory.  The reference implementation backing the
/// test suite; real deployments wrap files or multi-part stores instead.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
    sector_offset: u32,
}

impl MemorySource {
    /// Wrap an image buffer.  Redump-sized images get the video-partition
    /// offset; anything else is treated as a bare game partition.
    pub fn new(data: Vec<u8>) -> Self {
        let total = (data.len() >> SECTOR_SHIFT) as u32;
        let sector_offset = if total == REDUMP_SECTORS { VIDEO_SECTORS } else { 0 };
        Self { data, sector_offset }
    }
}

impl SectorSource for MemorySource {
    fn sector_offset(&self) -> u32 {
        self.sector_offset
    }

    fn total_sectors(&self) -> u32 {
        (self.data.len() >> SECTOR_SHIFT) as u32
    }

    fn read_bytes(&mut self, position: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = position as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of image",
            ));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_readers() {
        let mut data = vec![0u8; SECTOR_SIZE];
        data[8] = 0x34;
        data[9] = 0x12;
        data[12] = 0x78;
        data[13] = 0x56;
        data[14] = 0x34;
        data[15] = 0x12;
        let mut source = MemorySource::new(data);

        assert_eq!(source.read_u16(8).unwrap(), 0x1234);
        assert_eq!(source.read_u32(12).unwrap(), 0x1234_5678);
        assert_eq!(source.read_byte(8).unwrap(), 0x34);
    }

    #[test]
    fn rejects_out_of_range_reads() {
        let mut source = MemorySource::new(vec![0u8; SECTOR_SIZE]);
        let mut buf = [0u8; 4];
        assert!(source.read_bytes(SECTOR_SIZE as u64 - 2, &mut buf).is_err());
    }

    #[test]
    fn small_images_have_no_video_partition() {
        let source = MemorySource::new(vec![0u8; SECTOR_SIZE * 4]);
        assert_eq!(source.sector_offset(), 0);
        assert_eq!(source.total_sectors(), 4);
    }
}
