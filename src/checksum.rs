//! Image and sector-subset digests.

use std::io;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::sector_set::SectorSet;
use crate::source::SectorSource;
use crate::task::CancelToken;

/// Streaming SHA-256 over the whole image, sector by sector, rendered as
/// uppercase hex.
pub fn compute_image_checksum<S, F>(
    source: &mut S,
    mut progress: Option<&mut F>,
    cancel: &CancelToken,
) -> io::Result<String>
where
    S: SectorSource,
    F: FnMut(f32),
{
    if let Some(ref mut cb) = progress {
        cb(0.0);
    }

    let total = source.total_sectors();
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; crate::disc::SECTOR_SIZE];

    for sector in 0..total {
        source.read_sector(sector, &mut buffer)?;
        hasher.update(buffer);

        if let Some(ref mut cb) = progress {
            cb(sector as f32 / total as f32);
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(hex::encode_upper(hasher.finalize()))
}

/// SHA-1 over a sector subset in its iteration order, rendered as uppercase
/// hex.  The set holds absolute indices, so sectors are read verbatim.
pub fn digest_sector_subset<S, F>(
    source: &mut S,
    sectors: &SectorSet,
    mut progress: Option<&mut F>,
) -> io::Result<String>
where
    S: SectorSource,
    F: FnMut(f32),
{
    let count = sectors.len();
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; crate::disc::SECTOR_SIZE];

    for (i, sector) in sectors.iter().enumerate() {
        source.read_sector(sector, &mut buffer)?;
        hasher.update(buffer);

        if let Some(ref mut cb) = progress {
            cb(i as f32 / count as f32);
        }
    }

    Ok(hex::encode_upper(hasher.finalize()))
}
