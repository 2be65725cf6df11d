//! Tests for SegmentAllocator
//!
//! These tests verify:
//! - Growth when no idle segment fits
//! - Exact reuse of released segments
//! - Smallest-fit choice and oldest-first among equal sizes
//! - Idle tree persistence through the header root

use std::io::Cursor;

use atlasdb::storage::{FileAccessor, RootSlot, SegmentAllocator, SEGMENT_HEADER_SIZE};
use atlasdb::tree::NODE_HEADER_SIZE;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (FileAccessor<Cursor<Vec<u8>>>, SegmentAllocator) {
    let file = FileAccessor::create(Cursor::new(Vec::new())).unwrap();
    (file, SegmentAllocator::new(0))
}

fn next_free(file: &FileAccessor<Cursor<Vec<u8>>>) -> u32 {
    file.header().next_segment_address
}

// =============================================================================
// Growth Tests
// =============================================================================

#[test]
fn test_acquire_grows_by_size_plus_prefix() {
    let (mut file, mut allocator) = setup();

    for size in [20usize, 9, 300] {
        let before = next_free(&file);
        let segment = allocator.acquire(&mut file, size).unwrap();
        assert_eq!(segment.address(), before);
        assert_eq!(segment.payload_len(), size);
        assert_eq!(next_free(&file), before + (size + SEGMENT_HEADER_SIZE) as u32);
    }
}

#[test]
fn test_small_requests_round_up_to_node_header() {
    let (mut file, mut allocator) = setup();

    let segment = allocator.acquire(&mut file, 1).unwrap();
    assert_eq!(segment.payload_len(), NODE_HEADER_SIZE);
}

#[test]
fn test_unsatisfiable_request_grows() {
    let (mut file, mut allocator) = setup();
    let small = allocator.acquire(&mut file, 16).unwrap();
    allocator.release(&mut file, small.address()).unwrap();

    let before = next_free(&file);
    let big = allocator.acquire(&mut file, 17).unwrap();
    assert_eq!(big.address(), before);
    assert_eq!(allocator.idle_segments(&mut file).unwrap(), vec![(small.address(), 16)]);
}

// =============================================================================
// Reuse Tests
// =============================================================================

#[test]
fn test_release_then_acquire_reuses_exact_segment() {
    let (mut file, mut allocator) = setup();
    let segment = allocator.acquire(&mut file, 64).unwrap();
    allocator.acquire(&mut file, 10).unwrap(); // keeps the first segment off the file end

    allocator.release(&mut file, segment.address()).unwrap();
    let before = next_free(&file);

    let reused = allocator.acquire(&mut file, 40).unwrap();
    assert_eq!(reused.address(), segment.address());
    assert_eq!(reused.payload_len(), 64, "segments are never split");
    assert!(reused.payload().iter().all(|&b| b == 0));
    assert_eq!(next_free(&file), before);
    assert!(allocator.idle_segments(&mut file).unwrap().is_empty());
}

#[test]
fn test_smallest_fitting_size_wins() {
    let (mut file, mut allocator) = setup();
    let sizes = [50usize, 20, 30, 80];
    let segments: Vec<_> = sizes
        .iter()
        .map(|&size| allocator.acquire(&mut file, size).unwrap())
        .collect();
    for segment in &segments {
        allocator.release(&mut file, segment.address()).unwrap();
    }

    assert_eq!(allocator.acquire(&mut file, 25).unwrap().address(), segments[2].address());
    assert_eq!(allocator.acquire(&mut file, 20).unwrap().address(), segments[1].address());
    assert_eq!(allocator.acquire(&mut file, 51).unwrap().address(), segments[3].address());
    assert_eq!(allocator.acquire(&mut file, 9).unwrap().address(), segments[0].address());
}

#[test]
fn test_equal_sizes_reused_oldest_first() {
    let (mut file, mut allocator) = setup();
    let segments: Vec<_> = (0..5).map(|_| allocator.acquire(&mut file, 24).unwrap()).collect();
    for segment in segments.iter().rev() {
        allocator.release(&mut file, segment.address()).unwrap();
    }

    for segment in segments.iter().rev() {
        assert_eq!(allocator.acquire(&mut file, 24).unwrap().address(), segment.address());
    }
}

#[test]
fn test_idle_listing_sorted_by_size() {
    let (mut file, mut allocator) = setup();
    let segments: Vec<_> = [40usize, 12, 40, 25, 12]
        .iter()
        .map(|&size| allocator.acquire(&mut file, size).unwrap())
        .collect();
    for segment in &segments {
        allocator.release(&mut file, segment.address()).unwrap();
    }

    let sizes: Vec<u32> = allocator
        .idle_segments(&mut file)
        .unwrap()
        .into_iter()
        .map(|(_, size)| size)
        .collect();
    assert_eq!(sizes, vec![12, 12, 25, 40, 40]);
    assert_eq!(allocator.check(&mut file).unwrap().nodes, 5);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_idle_tree_survives_reopen() {
    let (mut file, mut allocator) = setup();
    let segments: Vec<_> = (1..=6)
        .map(|i| allocator.acquire(&mut file, i * 10).unwrap())
        .collect();
    for segment in &segments {
        allocator.release(&mut file, segment.address()).unwrap();
    }
    let expected = allocator.idle_segments(&mut file).unwrap();

    assert_eq!(allocator.flush(&mut file).unwrap(), 6);
    assert_eq!(allocator.flush(&mut file).unwrap(), 0);
    assert!(file.commit_header().unwrap());

    let mut file = FileAccessor::open(file.into_inner()).unwrap();
    let root = file.header().root(RootSlot::IdleSegments);
    assert_ne!(root, 0);

    let mut allocator = SegmentAllocator::new(root);
    assert_eq!(allocator.idle_segments(&mut file).unwrap(), expected);
    allocator.check(&mut file).unwrap();

    let reused = allocator.acquire(&mut file, 35).unwrap();
    assert_eq!(reused.address(), segments[3].address());
}
