//! Container volume back to a raw sector stream.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::disc::SECTOR_SIZE;

use super::header::CciHeader;
use super::index::IndexEntry;
use super::CciError;

/// Decode one container volume into `output`.
///
/// The header is validated strictly; any structural inconsistency in the
/// index or a failed block decompression surfaces as an error, never a
/// panic.  Multi-volume images are decoded one volume at a time.
pub fn decode_container(input: &Path, output: &Path) -> Result<(), CciError> {
    let mut reader = BufReader::new(File::open(input)?);
    let header = CciHeader::read(&mut reader)?;

    let entry_count = header.entry_count();
    reader.seek(SeekFrom::Start(header.index_offset))?;

    let mut entries: Vec<IndexEntry> = Vec::new();
    for _ in 0..=entry_count {
        entries.push(IndexEntry::unpack(reader.read_u32::<LittleEndian>()?));
    }

    let mut writer = BufWriter::new(File::create(output)?);

    for i in 0..entry_count as usize {
        let entry = entries[i];
        let corrupt = || CciError::CorruptBlock { sector: i as u64 };
        let size = entries[i + 1]
            .byte_offset
            .checked_sub(entry.byte_offset)
            .ok_or_else(corrupt)? as usize;

        reader.seek(SeekFrom::Start(entry.byte_offset))?;

        if size < SECTOR_SIZE || entry.compressed {
            let padding = reader.read_u8()? as usize;
            let body_len = size.checked_sub(1).ok_or_else(corrupt)?;
            let mut body = vec![0u8; body_len];
            reader.read_exact(&mut body)?;

            let compressed_len = body_len.checked_sub(padding).ok_or_else(corrupt)?;
            let decoded = lz4_flex::block::decompress(&body[..compressed_len], SECTOR_SIZE)
                .map_err(|_| corrupt())?;
            if decoded.len() != SECTOR_SIZE {
                return Err(corrupt());
            }
            writer.write_all(&decoded)?;
        } else {
            let mut block = vec![0u8; SECTOR_SIZE];
            reader.read_exact(&mut block)?;
            writer.write_all(&block)?;
        }
    }

    writer.flush()?;
    Ok(())
}
