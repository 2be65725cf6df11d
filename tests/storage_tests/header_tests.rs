//! Tests for the file header
//!
//! These tests verify:
//! - Byte layout and round trip
//! - Signature, version and reserved-field validation
//! - Root and next-free-offset sanity checks

use std::io::Cursor;

use atlasdb::storage::{FileAccessor, FileHeader, RootSlot, FORMAT_VERSION, HEADER_SIZE, SIGNATURE};
use atlasdb::{AtlasError, ErrorKind};

// =============================================================================
// Helper Functions
// =============================================================================

fn fresh_file() -> Vec<u8> {
    let accessor = FileAccessor::create(Cursor::new(Vec::new())).unwrap();
    accessor.into_inner().into_inner()
}

fn open_bytes(bytes: Vec<u8>) -> atlasdb::Result<FileAccessor<Cursor<Vec<u8>>>> {
    FileAccessor::open(Cursor::new(bytes))
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_fresh_header_layout() {
    let bytes = fresh_file();

    assert_eq!(bytes.len(), HEADER_SIZE);
    assert_eq!(&bytes[..16], SIGNATURE);
    assert_eq!(&bytes[16..18], &FORMAT_VERSION.to_be_bytes());
    assert_eq!(&bytes[18..22], &(HEADER_SIZE as i32).to_be_bytes());
    assert_eq!(&bytes[22..34], &[0u8; 12]);
}

#[test]
fn test_header_round_trip() {
    let mut header = FileHeader::new();
    header.next_segment_address = 4096;
    header.set_root(RootSlot::TableDirectory, 100);
    header.set_root(RootSlot::IdleSegments, 2000);

    let decoded = FileHeader::decode(&header.encode()).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(decoded.root(RootSlot::TableDirectory), 100);
    assert_eq!(decoded.root(RootSlot::IdleSegments), 2000);
}

#[test]
fn test_reopen_reads_same_header() {
    let mut accessor = FileAccessor::create(Cursor::new(Vec::new())).unwrap();
    let segment = accessor.create_segment(40).unwrap();
    accessor.set_root(RootSlot::TableDirectory, segment.address());
    assert!(accessor.commit_header().unwrap());
    let written = *accessor.header();

    let mut reopened = FileAccessor::open(accessor.into_inner()).unwrap();
    assert_eq!(*reopened.header(), written);
    assert_eq!(reopened.read_header().unwrap(), written);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_every_signature_byte_is_checked() {
    for i in 0..SIGNATURE.len() {
        let mut bytes = fresh_file();
        bytes[i] ^= 0x20;
        let err = open_bytes(bytes).err().unwrap();
        assert!(matches!(err, AtlasError::BadSignature), "byte {}: {}", i, err);
        assert_eq!(err.kind(), ErrorKind::FileFormat);
    }
}

#[test]
fn test_unsupported_version() {
    let mut bytes = fresh_file();
    bytes[16..18].copy_from_slice(&2u16.to_be_bytes());

    let err = open_bytes(bytes).err().unwrap();
    assert!(matches!(
        err,
        AtlasError::UnsupportedVersion {
            found: 2,
            supported: FORMAT_VERSION
        }
    ));
    assert!(err.is_file_format());
}

#[test]
fn test_reserved_must_be_zero() {
    let mut bytes = fresh_file();
    bytes[25] = 1;

    let err = open_bytes(bytes).err().unwrap();
    assert!(err.is_file_format());
}

#[test]
fn test_negative_root_rejected() {
    let mut bytes = fresh_file();
    bytes[26..30].copy_from_slice(&(-5i32).to_be_bytes());

    assert!(open_bytes(bytes).err().unwrap().is_file_format());
}

#[test]
fn test_root_past_segment_area_rejected() {
    let mut bytes = fresh_file();
    bytes[30..34].copy_from_slice(&500i32.to_be_bytes());

    assert!(open_bytes(bytes).err().unwrap().is_file_format());
}

#[test]
fn test_next_free_inside_header_rejected() {
    let mut bytes = fresh_file();
    bytes[18..22].copy_from_slice(&10i32.to_be_bytes());

    assert!(open_bytes(bytes).err().unwrap().is_file_format());
}

#[test]
fn test_short_file_is_format_error() {
    let bytes = fresh_file()[..20].to_vec();

    let err = open_bytes(bytes).err().unwrap();
    assert!(err.is_file_format(), "{}", err);
}

#[test]
fn test_empty_file_is_format_error() {
    assert!(open_bytes(Vec::new()).err().unwrap().is_file_format());
}
