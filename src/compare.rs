//! Image comparison.
//!
//! Reports through the `on_log` callback and never fails on content
//! differences; only genuine I/O errors propagate.  The report covers the
//! game partitions only: partition-offset notes, raw mismatch ranges, then
//! data-sector and security-sector digests for both images.

use std::io;

use crate::checksum::digest_sector_subset;
use crate::disc::{SECTOR_SIZE, VIDEO_SECTORS};
use crate::security::detect_security_sectors;
use crate::source::SectorSource;
use crate::task::CancelToken;
use crate::tree::classify_data_sectors;

/// Compare two images and report every difference through `on_log`.
///
/// Mismatch ranges are partition-relative with redump-relative bounds in
/// parentheses; sectors past the shorter image's end read as all zeros.
/// Each image's data and security sets are hashed through its own source.
pub fn compare_images<A, B, L, F>(
    first: &mut A,
    second: &mut B,
    mut on_log: L,
    mut progress: Option<&mut F>,
) -> io::Result<()>
where
    A: SectorSource,
    B: SectorSource,
    L: FnMut(&str),
    F: FnMut(f32),
{
    let off_a = first.sector_offset();
    let off_b = second.sector_offset();

    if off_a > 0 {
        on_log("First contains a video partition, compare will ignore those sectors.");
    }
    if off_b > 0 {
        on_log("Second contains a video partition, compare will ignore those sectors.");
    }

    let len_a = first.total_sectors() - off_a;
    let len_b = second.total_sectors() - off_b;
    if len_a != len_b {
        on_log("Expected sector counts do not match, assuming image could be trimmed.");
    }

    let count = len_a.max(len_b);
    let redump_shift = (VIDEO_SECTORS - off_a) as u64;

    let mut in_run = false;
    let mut run_start = 0u32;
    let mut buffer_a = [0u8; SECTOR_SIZE];
    let mut buffer_b = [0u8; SECTOR_SIZE];

    for i in 0..count {
        if i < len_a {
            first.read_sector(i + off_a, &mut buffer_a)?;
        } else {
            buffer_a = [0u8; SECTOR_SIZE];
        }
        if i < len_b {
            second.read_sector(i + off_b, &mut buffer_b)?;
        } else {
            buffer_b = [0u8; SECTOR_SIZE];
        }

        if buffer_a != buffer_b {
            if !in_run {
                run_start = i;
                in_run = true;
            }
        } else if in_run {
            let run_end = i - 1;
            in_run = false;
            on_log(&format!(
                "Game partition sectors in range {}-{} (Redump range {}-{}) are different.",
                run_start,
                run_end,
                run_start as u64 + redump_shift,
                run_end as u64 + redump_shift,
            ));
        }

        if let Some(ref mut cb) = progress {
            cb(i as f32 / count as f32);
        }
    }

    if in_run {
        let run_end = count - 1;
        on_log(&format!(
            "Game partition sectors in range {}-{} (Redump range {}-{}) are different.",
            run_start,
            run_end,
            run_start as u64 + redump_shift,
            run_end as u64 + redump_shift,
        ));
    }

    on_log("");

    let cancel = CancelToken::new();

    on_log("Getting data sectors hash for first...");
    let data_sectors_a = classify_data_sectors(first, progress.as_mut().map(|p| &mut **p), &cancel)?;

    on_log("Calculating data sector hashes for first...");
    let data_digest_a = digest_sector_subset(first, &data_sectors_a, progress.as_mut().map(|p| &mut **p))?;

    on_log("Getting data sectors hash for second...");
    let data_sectors_b = classify_data_sectors(second, progress.as_mut().map(|p| &mut **p), &cancel)?;

    on_log("Calculating data sector hash for second...");
    let data_digest_b = digest_sector_subset(second, &data_sectors_b, progress.as_mut().map(|p| &mut **p))?;

    if data_digest_a == data_digest_b {
        on_log("Data sectors match.");
    } else {
        on_log("Data sectors do not match.");
    }

    on_log("");

    on_log("Getting security sectors hash for first...");
    let security_sectors_a =
        detect_security_sectors(first, &data_sectors_a, progress.as_mut().map(|p| &mut **p), &cancel)?;

    on_log("Calculating security sector hashes for first...");
    let security_digest_a =
        digest_sector_subset(first, &security_sectors_a, progress.as_mut().map(|p| &mut **p))?;

    on_log("Getting security sectors hash for second...");
    let security_sectors_b =
        detect_security_sectors(second, &data_sectors_b, progress.as_mut().map(|p| &mut **p), &cancel)?;

    on_log("Calculating security sector hash for second...");
    let security_digest_b =
        digest_sector_subset(second, &security_sectors_b, progress.as_mut().map(|p| &mut **p))?;

    if security_digest_a == security_digest_b {
        on_log("Security sectors match.");
    } else {
        on_log("Security sectors do not match.");
    }

    Ok(())
}
