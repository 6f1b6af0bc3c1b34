//! Two-volume image splitting.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::disc::SECTOR_SIZE;
use crate::security::detect_security_sectors;
use crate::sector_set::SectorSet;
use crate::source::SectorSource;
use crate::task::CancelToken;
use crate::tree::classify_data_sectors;

/// Split the game partition into `<name>.1<extension>` and
/// `<name>.2<extension>` at the midpoint of the post-offset sector range.
///
/// With `scrub`, sectors outside the data and security sets are written as
/// zeros; `trimmed_scrub` additionally stops at the last data sector.
/// Cancellation leaves the partially written volumes on disk.
pub fn split_image<S, F>(
    source: &mut S,
    output_dir: &Path,
    name: &str,
    extension: &str,
    scrub: bool,
    trimmed_scrub: bool,
    mut progress: Option<&mut F>,
    cancel: &CancelToken,
) -> io::Result<()>
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

    let offset = source.sector_offset();
    let half = (end_sector - offset) / 2;

    let mut first_volume =
        BufWriter::new(File::create(output_dir.join(format!("{name}.1{extension}")))?);
    let mut second_volume =
        BufWriter::new(File::create(output_dir.join(format!("{name}.2{extension}")))?);

    let empty_sector = [0u8; SECTOR_SIZE];
    let mut buffer = [0u8; SECTOR_SIZE];

    for sector in offset..end_sector {
        let volume = if sector - offset >= half {
            &mut second_volume
        } else {
            &mut first_volume
        };

        if !scrub || keep_sectors.contains(sector) {
            source.read_sector(sector, &mut buffer)?;
            volume.write_all(&buffer)?;
        } else {
            volume.write_all(&empty_sector)?;
        }

        if let Some(ref mut cb) = progress {
            cb((sector - offset) as f32 / (end_sector - offset) as f32);
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    first_volume.flush()?;
    second_volume.flush()?;
    Ok(())
}
