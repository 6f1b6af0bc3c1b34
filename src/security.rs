//! Security-sector detection.
//!
//! Pressed discs carry runs of deliberately unreadable sectors that dump as
//! zeros.  The scanner walks the fixed probe range once, tracking a single
//! open zero run at a time, and accepts a run only when it is exactly
//! `SECURITY_RUN_SECTORS` long.  Anything else (shorter, longer, or simply
//! unallocated space) is not a security region.

use std::io;

use crate::disc::{REDUMP_SECTORS, SECTOR_SIZE, SECURITY_RUN_SECTORS, SECURITY_SCAN_END, XISO_SECTORS};
use crate::sector_set::SectorSet;
use crate::source::SectorSource;
use crate::task::CancelToken;

/// Scan for security-sector runs.
///
/// Images that are not exactly redump- or XISO-sized cannot carry the
/// pressed layout and yield an empty set without touching the source.
/// `data_sectors` suppresses runs that start inside filesystem data.
pub fn detect_security_sectors<S, F>(
    source: &mut S,
    data_sectors: &SectorSet,
    mut progress: Option<&mut F>,
    cancel: &CancelToken,
) -> io::Result<SectorSet>
where
    S: SectorSource,
    F: FnMut(f32),
{
    let mut security_sectors = SectorSet::new();

    let total = source.total_sectors();
    if total != REDUMP_SECTORS && total != XISO_SECTORS {
        return Ok(security_sectors);
    }

    if let Some(ref mut cb) = progress {
        cb(0.0);
    }

    let mut in_run = false;
    let mut run_start = 0u32;
    let mut buffer = [0u8; SECTOR_SIZE];

    for index in 0..=SECURITY_SCAN_END {
        let sector = source.sector_offset() + index;
        source.read_sector(sector, &mut buffer)?;

        let is_empty = buffer.iter().all(|&b| b == 0);
        let is_data = data_sectors.contains(sector);

        if is_empty && !in_run && !is_data {
            run_start = sector;
            in_run = true;
        } else if !is_empty && in_run {
            let run_end = sector - 1;
            in_run = false;
            if run_end - run_start + 1 == SECURITY_RUN_SECTORS {
                for s in run_start..=run_end {
                    security_sectors.insert(s);
                }
            }
        }

        if let Some(ref mut cb) = progress {
            cb(index as f32 / SECURITY_SCAN_END as f32);
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(security_sectors)
}
