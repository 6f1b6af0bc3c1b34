//! Sector stream to multi-volume container.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::disc::{REDUMP_SECTORS, SECTOR_SIZE, VIDEO_SECTORS};
use crate::security::detect_security_sectors;
use crate::sector_set::SectorSet;
use crate::source::SectorSource;
use crate::task::CancelToken;
use crate::tree::classify_data_sectors;

use super::header::{CciHeader, BLOCK_SIZE, HEADER_SIZE, INDEX_ALIGNMENT};
use super::index::IndexEntry;
use super::CciError;

/// A volume is closed once its payload crosses this many bytes.
pub const VOLUME_SPLIT_THRESHOLD: u64 = 0xFF00_0000;

/// Output path for volume `iteration` (0-based).  The first volume keeps
/// the bare name; later volumes get `.2`, `.3`, ...
pub(crate) fn volume_path(output_dir: &Path, name: &str, extension: &str, iteration: u32) -> PathBuf {
    if iteration > 0 {
        output_dir.join(format!("{name}.{}{extension}", iteration + 1))
    } else {
        output_dir.join(format!("{name}{extension}"))
    }
}

/// Compress an image into one or more container volumes.
///
/// Every sector is LZ4-compressed; the compressed form is kept only when it
/// fits under the break-even bound, otherwise the raw sector is stored.
/// Redump-sized images are encoded from `VIDEO_SECTORS` onward, so the
/// container never carries the video partition.  With `scrub`, sectors
/// outside the data and security sets are encoded as zeros.
///
/// Cancellation aborts the whole operation and leaves the partial volume
/// on disk without an index table.
pub fn encode_container<S, F>(
    source: &mut S,
    output_dir: &Path,
    name: &str,
    extension: &str,
    scrub: bool,
    trimmed_scrub: bool,
    mut progress: Option<&mut F>,
    cancel: &CancelToken,
) -> Result<(), CciError>
where
    S: SectorSource,
    F: FnMut(f32),
{
    if let Some(ref mut cb) = progress {
        cb(0.0);
    }

    let mut end_sector = source.total_sectors();
    let mut keep_sectors = SectorSet::new();
    if scrub {
        keep_sectors = classify_data_sectors(source, progress.as_mut().map(|p| &mut **p), cancel)?;

        if trimmed_scrub {
            if let Some(max) = keep_sectors.max() {
                end_sector = end_sector.min(max + 1);
            }
        }

        let security_sectors =
            detect_security_sectors(source, &keep_sectors, progress.as_mut().map(|p| &mut **p), cancel)?;
        for sector in &security_sectors {
            keep_sectors.insert(sector);
        }
    }

    let start_sector = if source.total_sectors() == REDUMP_SECTORS {
        VIDEO_SECTORS
    } else {
        0
    };

    let compressed_bound = SECTOR_SIZE - (4 + (1 << INDEX_ALIGNMENT));
    let alignment_multiple = 1usize << INDEX_ALIGNMENT;

    let empty_sector = [0u8; SECTOR_SIZE];
    let mut buffer = [0u8; SECTOR_SIZE];
    let mut sectors_written = start_sector;
    let mut iteration = 0u32;

    while sectors_written < end_sector {
        let path = volume_path(output_dir, name, extension, iteration);
        let mut writer = BufWriter::new(File::create(&path)?);

        let mut header = CciHeader::new();
        header.write(&mut writer)?;

        let mut position = HEADER_SIZE as u64;
        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut uncompressed_size = 0u64;

        while sectors_written < end_sector {
            let keep = !scrub || keep_sectors.contains(sectors_written);
            let sector: &[u8] = if keep {
                source.read_sector(sectors_written, &mut buffer)?;
                &buffer
            } else {
                &empty_sector
            };

            let compressed = lz4_flex::block::compress(sector);
            if !compressed.is_empty() && compressed.len() < compressed_bound {
                let written = (compressed.len() + 1 + alignment_multiple - 1) / alignment_multiple
                    * alignment_multiple;
                let padding = written - (compressed.len() + 1);
                writer.write_u8(padding as u8)?;
                writer.write_all(&compressed)?;
                if padding != 0 {
                    writer.write_all(&empty_sector[..padding])?;
                }
                entries.push(IndexEntry { byte_offset: position, compressed: true });
                position += written as u64;
            } else {
                writer.write_all(sector)?;
                entries.push(IndexEntry { byte_offset: position, compressed: false });
                position += SECTOR_SIZE as u64;
            }

            uncompressed_size += BLOCK_SIZE as u64;
            sectors_written += 1;

            if position > VOLUME_SPLIT_THRESHOLD {
                break;
            }

            if let Some(ref mut cb) = progress {
                cb((sectors_written - start_sector) as f32 / (end_sector - start_sector) as f32);
            }

            if cancel.is_cancelled() {
                break;
            }
        }

        if cancel.is_cancelled() {
            writer.flush()?;
            return Ok(());
        }

        let index_offset = position;
        for entry in &entries {
            writer.write_u32::<LittleEndian>(entry.pack())?;
        }
        let sentinel = IndexEntry { byte_offset: position, compressed: false };
        writer.write_u32::<LittleEndian>(sentinel.pack())?;

        header.uncompressed_size = uncompressed_size;
        header.index_offset = index_offset;
        let mut file = writer.into_inner().map_err(io::Error::from)?;
        file.seek(SeekFrom::Start(8))?;
        file.write_u64::<LittleEndian>(header.uncompressed_size)?;
        file.write_u64::<LittleEndian>(header.index_offset)?;

        iteration += 1;
    }

    Ok(())
}
