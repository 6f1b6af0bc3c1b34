pub mod cci;
pub mod checksum;
pub mod compare;
pub mod disc;
pub mod sector_set;
pub mod security;
pub mod source;
pub mod split;
pub mod task;
pub mod tree;

pub use cci::{decode_container, encode_container, CciError, CciHeader, IndexEntry};
pub use checksum::{compute_image_checksum, digest_sector_subset};
pub use compare::compare_images;
pub use sector_set::SectorSet;
pub use security::detect_security_sectors;
pub use source::{MemorySource, SectorSource};
pub use split::split_image;
pub use task::{CancelToken, ProgressFn};
pub use tree::{
    classify_data_sectors, enumerate_file_entries, extract_default_executable, find_named_file,
    FileEntry,
};
