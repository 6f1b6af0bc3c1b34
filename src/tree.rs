//! XDVDFS directory-tree walker.
//!
//! # Layout
//!
//! The volume descriptor sits `VOLUME_ANCHOR_OFFSET` bytes into sector
//! `sector_offset + 0x20` and names the root directory table (start sector,
//! byte size).  Directory tables are on-disk binary search trees: each entry
//! holds `left`/`right` sibling offsets in 4-byte units, a start sector,
//! a byte size, attribute flags, and an ASCII name.  `left == 0xFFFF` marks
//! an unused slot and ends that branch.
//!
//! Traversal is breadth-first over an explicit queue.  Three operations
//! share the walk:
//!
//! - [`classify_data_sectors`]: collect every sector the filesystem
//!   references (volume anchor, directory tables, file payloads).
//! - [`enumerate_file_entries`]: emit a [`FileEntry`] per directory and
//!   file, with absolute sector bounds and slice placement.
//! - [`find_named_file`]: search the root directory table for a file by
//!   name (case-insensitive) and read its contents.
//!
//! Progress is `processed / total_discovered`, a converging approximation
//! since the queue grows while the walk runs.

use std::collections::VecDeque;
use std::io;

use crate::disc::{
    sectors_spanned, DEFAULT_EXECUTABLE, SECTOR_SHIFT, SECTOR_SIZE, VOLUME_ANCHOR_OFFSET,
    VOLUME_ANCHOR_SECTOR,
};
use crate::sector_set::SectorSet;
use crate::source::SectorSource;
use crate::task::CancelToken;

/// Unused-slot sentinel in a directory entry's `left` field.
const UNUSED_ENTRY: u16 = 0xFFFF;

/// Attribute bit marking a subdirectory.
const ATTR_DIRECTORY: u8 = 0x10;

/// One directory or file, as reported by [`enumerate_file_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub is_file: bool,
    /// Directories: the joined path including their own name.
    /// Files: the parent directory's path.
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Absolute first sector, or -1 for zero-size files.
    pub start_sector: i64,
    /// Absolute last sector, or -1 for zero-size files.
    pub end_sector: i64,
    /// Physical slices holding the first and last sector, deduplicated in
    /// first-seen order.  Empty when the entry occupies no sectors.
    pub slices: Vec<u32>,
}

struct TreeNode {
    directory_size: u32,
    directory_pos: u64,
    entry_offset: u32,
    path: String,
}

struct DirectoryEntry {
    left: u16,
    right: u16,
    start_sector: u32,
    byte_size: u32,
    attributes: u8,
    name: String,
}

impl DirectoryEntry {
    fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }
}

fn read_entry<S: SectorSource>(source: &mut S, position: u64) -> io::Result<DirectoryEntry> {
    let left = source.read_u16(position)?;
    let right = source.read_u16(position + 2)?;
    let start_sector = source.read_u32(position + 4)?;
    let byte_size = source.read_u32(position + 8)?;
    let attributes = source.read_byte(position + 12)?;
    let name_len = source.read_byte(position + 13)?;
    let mut name_bytes = vec![0u8; name_len as usize];
    source.read_bytes(position + 14, &mut name_bytes)?;
    Ok(DirectoryEntry {
        left,
        right,
        start_sector,
        byte_size,
        attributes,
        name: String::from_utf8_lossy(&name_bytes).into_owned(),
    })
}

/// Root directory table position (partition-relative bytes) and byte size.
fn read_root<S: SectorSource>(source: &mut S) -> io::Result<(u64, u32)> {
    let anchor_sector = source.sector_offset() + VOLUME_ANCHOR_SECTOR;
    let position = ((anchor_sector as u64) << SECTOR_SHIFT) + VOLUME_ANCHOR_OFFSET;
    let root_sector = source.read_u32(position)?;
    let root_size = source.read_u32(position + 4)?;
    Ok(((root_sector as u64) << SECTOR_SHIFT, root_size))
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Collect every sector the filesystem references.
///
/// The two volume-anchor sectors are always included.  Directory-table
/// sectors are marked even when the entry slot turns out to be exhausted or
/// a sentinel; file payload sectors are marked for sized files only.  All
/// indices are absolute (video-partition offset included).
pub fn classify_data_sectors<S, F>(
    source: &mut S,
    mut progress: Option<&mut F>,
    cancel: &CancelToken,
) -> io::Result<SectorSet>
where
    S: SectorSource,
    F: FnMut(f32),
{
    if let Some(ref mut cb) = progress {
        cb(0.0);
    }

    let mut sectors = SectorSet::new();
    let anchor_sector = source.sector_offset() + VOLUME_ANCHOR_SECTOR;
    sectors.insert(anchor_sector);
    sectors.insert(anchor_sector + 1);

    let (root_pos, root_size) = read_root(source)?;
    let partition_base = (source.sector_offset() as u64) << SECTOR_SHIFT;

    let mut queue = VecDeque::new();
    queue.push_back(TreeNode {
        directory_size: root_size,
        directory_pos: root_pos,
        entry_offset: 0,
        path: String::new(),
    });

    let mut total_nodes = 1u64;
    let mut processed_nodes = 0u64;

    while let Some(node) = queue.pop_front() {
        processed_nodes += 1;

        let entry_bytes = node.entry_offset as u64 * 4;
        let position = partition_base + node.directory_pos + entry_bytes;

        // Mark the table sectors this node still spans before deciding
        // whether the slot itself is past the end of the table.
        let span = sectors_spanned((node.directory_size as u64).saturating_sub(entry_bytes));
        let first = position >> SECTOR_SHIFT;
        for sector in first..first + span {
            sectors.insert(sector as u32);
        }

        if entry_bytes >= node.directory_size as u64 {
            continue;
        }

        let entry = read_entry(source, position)?;
        if entry.left == UNUSED_ENTRY {
            continue;
        }

        if entry.left != 0 {
            queue.push_back(TreeNode {
                directory_size: node.directory_size,
                directory_pos: node.directory_pos,
                entry_offset: entry.left as u32,
                path: node.path.clone(),
            });
            total_nodes += 1;
        }

        if entry.is_directory() {
            if entry.byte_size > 0 {
                queue.push_back(TreeNode {
                    directory_size: entry.byte_size,
                    directory_pos: (entry.start_sector as u64) << SECTOR_SHIFT,
                    entry_offset: 0,
                    path: join_path(&node.path, &entry.name),
                });
                total_nodes += 1;
            }
        } else if entry.byte_size > 0 {
            let start = source.sector_offset() + entry.start_sector;
            let span = sectors_spanned(entry.byte_size as u64) as u32;
            for sector in start..start + span {
                sectors.insert(sector);
            }
        }

        if entry.right != 0 {
            queue.push_back(TreeNode {
                directory_size: node.directory_size,
                directory_pos: node.directory_pos,
                entry_offset: entry.right as u32,
                path: node.path.clone(),
            });
            total_nodes += 1;
        }

        if let Some(ref mut cb) = progress {
            cb(processed_nodes as f32 / total_nodes as f32);
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(sectors)
}

/// Walk the tree and emit a [`FileEntry`] per directory and file.
///
/// Zero-size subdirectories are neither descended into nor emitted;
/// zero-size files are emitted with `-1` sector bounds and no slices.
pub fn enumerate_file_entries<S, E, F>(
    source: &mut S,
    mut on_entry: E,
    mut progress: Option<&mut F>,
    cancel: &CancelToken,
) -> io::Result<()>
where
    S: SectorSource,
    E: FnMut(FileEntry),
    F: FnMut(f32),
{
    if let Some(ref mut cb) = progress {
        cb(0.0);
    }

    let (root_pos, root_size) = read_root(source)?;
    let partition_base = (source.sector_offset() as u64) << SECTOR_SHIFT;

    let mut queue = VecDeque::new();
    queue.push_back(TreeNode {
        directory_size: root_size,
        directory_pos: root_pos,
        entry_offset: 0,
        path: String::new(),
    });

    let mut total_nodes = 1u64;
    let mut processed_nodes = 0u64;

    while let Some(node) = queue.pop_front() {
        processed_nodes += 1;

        let entry_bytes = node.entry_offset as u64 * 4;
        let position = partition_base + node.directory_pos + entry_bytes;

        if entry_bytes >= node.directory_size as u64 {
            continue;
        }

        let entry = read_entry(source, position)?;
        if entry.left == UNUSED_ENTRY {
            continue;
        }

        if entry.left != 0 {
            queue.push_back(TreeNode {
                directory_size: node.directory_size,
                directory_pos: node.directory_pos,
                entry_offset: entry.left as u32,
                path: node.path.clone(),
            });
            total_nodes += 1;
        }

        if entry.is_directory() {
            if entry.byte_size > 0 {
                let child_path = join_path(&node.path, &entry.name);
                queue.push_back(TreeNode {
                    directory_size: entry.byte_size,
                    directory_pos: (entry.start_sector as u64) << SECTOR_SHIFT,
                    entry_offset: 0,
                    path: child_path.clone(),
                });
                total_nodes += 1;

                let start = source.sector_offset() as u64 + entry.start_sector as u64;
                let end = start + sectors_spanned(entry.byte_size as u64) - 1;
                on_entry(FileEntry {
                    is_file: false,
                    path: child_path,
                    name: entry.name.clone(),
                    size: entry.byte_size as u64,
                    start_sector: start as i64,
                    end_sector: end as i64,
                    slices: Vec::new(),
                });
            }
        } else if entry.byte_size > 0 {
            let start = source.sector_offset() + entry.start_sector;
            let end = start + sectors_spanned(entry.byte_size as u64) as u32 - 1;
            let mut slices = vec![source.sector_in_slice(start)];
            let last_slice = source.sector_in_slice(end);
            if !slices.contains(&last_slice) {
                slices.push(last_slice);
            }
            on_entry(FileEntry {
                is_file: true,
                path: node.path.clone(),
                name: entry.name.clone(),
                size: entry.byte_size as u64,
                start_sector: start as i64,
                end_sector: end as i64,
                slices,
            });
        } else {
            on_entry(FileEntry {
                is_file: true,
                path: node.path.clone(),
                name: entry.name.clone(),
                size: 0,
                start_sector: -1,
                end_sector: -1,
                slices: Vec::new(),
            });
        }

        if entry.right != 0 {
            queue.push_back(TreeNode {
                directory_size: node.directory_size,
                directory_pos: node.directory_pos,
                entry_offset: entry.right as u32,
                path: node.path.clone(),
            });
            total_nodes += 1;
        }

        if let Some(ref mut cb) = progress {
            cb(processed_nodes as f32 / total_nodes as f32);
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(())
}

/// Search the root directory table for a file by name (case-insensitive)
/// and return its contents.
///
/// The name check runs before the sentinel check, so even an unused slot's
/// entry is name-tested.  Subdirectories are not descended into; the boot
/// executable lives in the root table.
pub fn find_named_file<S>(source: &mut S, name: &str) -> io::Result<Option<Vec<u8>>>
where
    S: SectorSource,
{
    let (root_pos, root_size) = read_root(source)?;
    let partition_base = (source.sector_offset() as u64) << SECTOR_SHIFT;

    let mut queue = VecDeque::new();
    queue.push_back(TreeNode {
        directory_size: root_size,
        directory_pos: root_pos,
        entry_offset: 0,
        path: String::new(),
    });

    while let Some(node) = queue.pop_front() {
        let entry_bytes = node.entry_offset as u64 * 4;
        let position = partition_base + node.directory_pos + entry_bytes;

        if entry_bytes >= node.directory_size as u64 {
            continue;
        }

        let entry = read_entry(source, position)?;

        if !entry.is_directory() && entry.name.eq_ignore_ascii_case(name) {
            return Ok(Some(read_file_bytes(
                source,
                entry.start_sector,
                entry.byte_size,
            )?));
        }

        if entry.left == UNUSED_ENTRY {
            continue;
        }

        if entry.left != 0 {
            queue.push_back(TreeNode {
                directory_size: node.directory_size,
                directory_pos: node.directory_pos,
                entry_offset: entry.left as u32,
                path: node.path.clone(),
            });
        }

        if entry.right != 0 {
            queue.push_back(TreeNode {
                directory_size: node.directory_size,
                directory_pos: node.directory_pos,
                entry_offset: entry.right as u32,
                path: node.path.clone(),
            });
        }
    }

    Ok(None)
}

/// Read the boot executable (`default.xbe`) out of the root directory.
pub fn extract_default_executable<S>(source: &mut S) -> io::Result<Option<Vec<u8>>>
where
    S: SectorSource,
{
    find_named_file(source, DEFAULT_EXECUTABLE)
}

fn read_file_bytes<S: SectorSource>(
    source: &mut S,
    start_sector: u32,
    byte_size: u32,
) -> io::Result<Vec<u8>> {
    let mut result = vec![0u8; byte_size as usize];
    let mut sector = source.sector_offset() + start_sector;
    let mut processed = 0usize;
    let mut buffer = [0u8; SECTOR_SIZE];
    while processed < byte_size as usize {
        source.read_sector(sector, &mut buffer)?;
        let take = (byte_size as usize - processed).min(SECTOR_SIZE);
        result[processed..processed + take].copy_from_slice(&buffer[..take]);
        sector += 1;
        processed += take;
    }
    Ok(result)
}
