mod common;

use std::fs::File;
use std::io::{Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use proptest::prelude::*;
use tempfile::tempdir;

use xdvd_repack::disc::{SECTOR_SHIFT, SECTOR_SIZE};
use xdvd_repack::{
    classify_data_sectors, decode_container, encode_container, CancelToken, CciError, CciHeader,
    IndexEntry, MemorySource,
};

use common::one_file_image;

fn fill_incompressible(image: &mut [u8], sector: u32) {
    let base = (sector as usize) << SECTOR_SHIFT;
    let mut x: u64 = 0x1234_5678;
    for i in 0..SECTOR_SIZE {
        x = x
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        image[base + i] = (x >> 56) as u8;
    }
}

#[test]
fn encode_decode_round_trip() {
    let mut image = one_file_image();
    fill_incompressible(&mut image, 0x27);

    let dir = tempdir().unwrap();
    let mut source = MemorySource::new(image.clone());
    let cancel = CancelToken::new();

    encode_container::<_, fn(f32)>(
        &mut source,
        dir.path(),
        "game",
        ".cci",
        false,
        false,
        None,
        &cancel,
    )
    .unwrap();

    decode_container(&dir.path().join("game.cci"), &dir.path().join("game.iso")).unwrap();

    let decoded = std::fs::read(dir.path().join("game.iso")).unwrap();
    assert_eq!(decoded, image);
}

#[test]
fn header_and_index_describe_the_payload() {
    let dir = tempdir().unwrap();
    let mut source = MemorySource::new(vec![0u8; 2 * SECTOR_SIZE]);
    let cancel = CancelToken::new();

    encode_container::<_, fn(f32)>(
        &mut source,
        dir.path(),
        "tiny",
        ".cci",
        false,
        false,
        None,
        &cancel,
    )
    .unwrap();

    let mut file = File::open(dir.path().join("tiny.cci")).unwrap();
    let header = CciHeader::read(&mut file).unwrap();
    assert_eq!(header.uncompressed_size, 2 * SECTOR_SIZE as u64);
    assert_eq!(header.entry_count(), 2);

    file.seek(SeekFrom::Start(header.index_offset)).unwrap();
    let mut words = Vec::new();
    while let Ok(word) = file.read_u32::<LittleEndian>() {
        words.push(word);
    }
    assert_eq!(words.len(), 3);

    let first = IndexEntry::unpack(words[0]);
    assert_eq!(first.byte_offset, 32);
    assert!(first.compressed);

    let sentinel = IndexEntry::unpack(words[2]);
    assert_eq!(sentinel.byte_offset, header.index_offset);
    assert!(!sentinel.compressed);
}

#[test]
fn rejects_a_corrupted_magic() {
    let dir = tempdir().unwrap();
    let mut source = MemorySource::new(vec![0u8; 2 * SECTOR_SIZE]);
    let cancel = CancelToken::new();

    encode_container::<_, fn(f32)>(
        &mut source,
        dir.path(),
        "tiny",
        ".cci",
        false,
        false,
        None,
        &cancel,
    )
    .unwrap();

    let path = dir.path().join("tiny.cci");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let err = decode_container(&path, &dir.path().join("tiny.iso")).unwrap_err();
    assert!(matches!(err, CciError::InvalidMagic));
    assert!(err.is_invalid_container());
}

#[test]
fn reports_the_sector_of_a_corrupt_block() {
    // Hand-built volume: one compressed block whose body is not valid LZ4.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x4D49_4343u32.to_le_bytes());
    bytes.extend_from_slice(&32u32.to_le_bytes());
    bytes.extend_from_slice(&2048u64.to_le_bytes());
    bytes.extend_from_slice(&36u64.to_le_bytes());
    bytes.extend_from_slice(&2048u32.to_le_bytes());
    bytes.push(1);
    bytes.push(2);
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&[0x00, 0x10, 0xAA, 0x00]);
    bytes.extend_from_slice(&((32u32 >> 2) | 0x8000_0000).to_le_bytes());
    bytes.extend_from_slice(&(36u32 >> 2).to_le_bytes());

    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.cci");
    std::fs::write(&path, bytes).unwrap();

    let err = decode_container(&path, &dir.path().join("bad.iso")).unwrap_err();
    assert!(matches!(err, CciError::CorruptBlock { sector: 0 }));
    assert!(err.is_invalid_container());
}

#[test]
fn scrubbed_encode_zeroes_unreferenced_sectors() {
    let mut image = one_file_image();
    let garbage_base = 0x26usize << SECTOR_SHIFT;
    for byte in &mut image[garbage_base..garbage_base + SECTOR_SIZE] {
        *byte = 0xAB;
    }

    let dir = tempdir().unwrap();
    let mut source = MemorySource::new(image.clone());
    let cancel = CancelToken::new();

    encode_container::<_, fn(f32)>(
        &mut source,
        dir.path(),
        "game",
        ".cci",
        true,
        false,
        None,
        &cancel,
    )
    .unwrap();

    decode_container(&dir.path().join("game.cci"), &dir.path().join("game.iso")).unwrap();
    let decoded = std::fs::read(dir.path().join("game.iso")).unwrap();

    let keep = classify_data_sectors::<_, fn(f32)>(&mut source, None, &cancel).unwrap();
    let mut expected = Vec::new();
    for sector in 0..0x28u32 {
        let base = (sector as usize) << SECTOR_SHIFT;
        if keep.contains(sector) {
            expected.extend_from_slice(&image[base..base + SECTOR_SIZE]);
        } else {
            expected.extend_from_slice(&[0u8; SECTOR_SIZE]);
        }
    }

    assert_eq!(decoded, expected);
}

#[test]
fn trimmed_scrub_stops_at_the_last_data_sector() {
    let dir = tempdir().unwrap();
    let mut source = MemorySource::new(one_file_image());
    let cancel = CancelToken::new();

    encode_container::<_, fn(f32)>(
        &mut source,
        dir.path(),
        "game",
        ".cci",
        true,
        true,
        None,
        &cancel,
    )
    .unwrap();

    decode_container(&dir.path().join("game.cci"), &dir.path().join("game.iso")).unwrap();
    let decoded = std::fs::read(dir.path().join("game.iso")).unwrap();

    assert_eq!(decoded.len(), 0x26 * SECTOR_SIZE);
}

#[test]
fn cancelled_encode_leaves_a_partial_volume() {
    let dir = tempdir().unwrap();
    let mut source = MemorySource::new(one_file_image());
    let cancel = CancelToken::new();
    cancel.cancel();

    encode_container::<_, fn(f32)>(
        &mut source,
        dir.path(),
        "game",
        ".cci",
        false,
        false,
        None,
        &cancel,
    )
    .unwrap();

    let len = std::fs::metadata(dir.path().join("game.cci")).unwrap().len();
    assert!(len > 0);
    assert!(len < SECTOR_SIZE as u64);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn round_trips_arbitrary_images(
        data in (1usize..5).prop_flat_map(|n| prop::collection::vec(any::<u8>(), n * SECTOR_SIZE)),
    ) {
        let dir = tempdir().unwrap();
        let mut source = MemorySource::new(data.clone());
        let cancel = CancelToken::new();

        encode_container::<_, fn(f32)>(
            &mut source,
            dir.path(),
            "img",
            ".cci",
            false,
            false,
            None,
            &cancel,
        )
        .unwrap();

        decode_container(&dir.path().join("img.cci"), &dir.path().join("img.iso")).unwrap();
        let decoded = std::fs::read(dir.path().join("img.iso")).unwrap();
        prop_assert_eq!(decoded, data);
    }
}
