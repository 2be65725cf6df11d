//! Tests for the table directory
//!
//! These tests verify:
//! - Specs survive a flush and a reload from the header root
//! - Duplicate names are rejected before any segment is taken
//! - Update rewrites the stored spec in place
//! - Removing a table frees its directory node

use atlasdb::storage::RootSlot;
use atlasdb::table::TableDirectory;
use atlasdb::AtlasError;

use crate::{allocator, codes_spec, memory_file, people_spec};

#[test]
fn test_create_and_lookup() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);

    let address = directory.create(&mut file, &mut allocator, &people_spec()).unwrap();
    let (found_at, spec) = directory.lookup(&mut file, "people").unwrap().unwrap();

    assert_eq!(found_at, address);
    assert_eq!(spec, people_spec());
    assert!(directory.lookup(&mut file, "nobody").unwrap().is_none());
}

#[test]
fn test_duplicate_name_rejected() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);
    directory.create(&mut file, &mut allocator, &people_spec()).unwrap();
    let size = file.header().next_segment_address;

    let err = directory.create(&mut file, &mut allocator, &people_spec()).unwrap_err();
    assert!(matches!(err, AtlasError::TableExists(ref name) if name == "people"));
    assert_eq!(file.header().next_segment_address, size);
}

#[test]
fn test_names_in_byte_order() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);
    directory.create(&mut file, &mut allocator, &people_spec()).unwrap();
    directory.create(&mut file, &mut allocator, &codes_spec()).unwrap();

    assert_eq!(directory.names(&mut file).unwrap(), vec!["codes", "people"]);
}

#[test]
fn test_flush_sets_header_root() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);
    let address = directory.create(&mut file, &mut allocator, &codes_spec()).unwrap();

    assert_eq!(directory.flush(&mut file).unwrap(), 1);
    assert_eq!(file.header().root(RootSlot::TableDirectory), address);

    let mut reloaded = TableDirectory::new(file.header().root(RootSlot::TableDirectory));
    let (_, spec) = reloaded.lookup(&mut file, "codes").unwrap().unwrap();
    assert_eq!(spec, codes_spec());
}

#[test]
fn test_update_rewrites_spec() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);
    let address = directory.create(&mut file, &mut allocator, &people_spec()).unwrap();
    directory.flush(&mut file).unwrap();

    // bump the counter through an index, then store the spec it carries
    let mut index = atlasdb::table::TableIndex::new(people_spec(), address);
    index
        .insert(
            &mut file,
            &mut allocator,
            &atlasdb::Record::new().with("name", "Ada").with("age", 36u32),
        )
        .unwrap();
    index.flush(&mut file).unwrap();
    directory.update(&mut file, address, index.spec()).unwrap();
    directory.flush(&mut file).unwrap();

    let mut reloaded = TableDirectory::new(file.header().root(RootSlot::TableDirectory));
    let (_, spec) = reloaded.lookup(&mut file, "people").unwrap().unwrap();
    assert_eq!(spec.row_count(), 1);
    assert_eq!(spec.next_counter(), 2);
    assert_ne!(spec.root(), 0);
}

#[test]
fn test_remove_releases_node() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);
    let address = directory.create(&mut file, &mut allocator, &people_spec()).unwrap();
    directory.flush(&mut file).unwrap();

    directory.remove(&mut file, &mut allocator, "people").unwrap();
    assert!(directory.lookup(&mut file, "people").unwrap().is_none());
    assert!(directory.names(&mut file).unwrap().is_empty());

    let idle = allocator.idle_segments(&mut file).unwrap();
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].0, address);

    let err = directory.remove(&mut file, &mut allocator, "people").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_check_reports_tree_shape() {
    let mut file = memory_file();
    let mut allocator = allocator();
    let mut directory = TableDirectory::new(0);
    directory.create(&mut file, &mut allocator, &people_spec()).unwrap();
    directory.create(&mut file, &mut allocator, &codes_spec()).unwrap();
    directory.flush(&mut file).unwrap();

    let check = directory.check(&mut file).unwrap();
    assert_eq!(check.nodes, 2);
    assert_eq!(check.height, 2);
}
