//! Property tests for the tree engine
//!
//! These tests verify, for arbitrary operation sequences:
//! - In-order traversal is sorted (duplicates in insertion order)
//! - Height stays within the AVL bound
//! - The persisted tree matches an in-memory model after reload

use std::collections::BTreeSet;

use atlasdb::tree::PersistentTree;
use proptest::prelude::*;

use crate::{in_order, insert, memory_file, tree, U32Keys};

/// Largest height an AVL tree with `n` nodes can reach
fn avl_height_bound(n: usize) -> f64 {
    1.4405 * ((n + 2) as f64).log2() - 0.3277
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u32),
    Remove(u32),
    Flush,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..64).prop_map(Op::Insert),
        2 => (0u32..64).prop_map(Op::Remove),
        1 => Just(Op::Flush),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_duplicate_keys_sorted_and_balanced(keys in prop::collection::vec(0u32..40, 1..200)) {
        let mut file = memory_file();
        let mut tree = tree(true);
        for &key in &keys {
            insert(&mut tree, &mut file, key, b"").unwrap();
        }

        let walked = in_order(&mut tree, &mut file);
        prop_assert_eq!(walked.len(), keys.len());
        for pair in walked.windows(2) {
            let ((a_addr, a_key), (b_addr, b_key)) = (pair[0], pair[1]);
            prop_assert!(a_key <= b_key);
            if a_key == b_key {
                // segments are appended, so insertion order is address order
                prop_assert!(a_addr < b_addr);
            }
        }

        let check = tree.check(&mut file).unwrap();
        prop_assert!((check.height as f64) <= avl_height_bound(keys.len()));
    }

    #[test]
    fn prop_matches_set_model(ops in prop::collection::vec(op(), 1..150)) {
        let mut file = memory_file();
        let mut tree = tree(false);
        let mut model = BTreeSet::new();

        for op in &ops {
            match *op {
                Op::Insert(key) => {
                    let result = insert(&mut tree, &mut file, key, b"");
                    prop_assert_eq!(result.is_ok(), model.insert(key));
                }
                Op::Remove(key) => {
                    let removed = tree.remove(&mut file, &key).unwrap();
                    prop_assert_eq!(removed.is_some(), model.remove(&key));
                }
                Op::Flush => {
                    tree.flush(&mut file).unwrap();
                    prop_assert_eq!(tree.dirty_count(), 0);
                }
            }
        }

        let keys: Vec<u32> = in_order(&mut tree, &mut file).into_iter().map(|(_, k)| k).collect();
        prop_assert_eq!(&keys, &model.iter().copied().collect::<Vec<_>>());
        let check = tree.check(&mut file).unwrap();
        prop_assert!((check.height as f64) <= avl_height_bound(model.len()));

        tree.flush(&mut file).unwrap();
        let mut reloaded = PersistentTree::new(U32Keys { duplicates: false }, tree.root());
        let reloaded_keys: Vec<u32> =
            in_order(&mut reloaded, &mut file).into_iter().map(|(_, k)| k).collect();
        prop_assert_eq!(reloaded_keys, keys);
    }

    #[test]
    fn prop_ceiling_removal_matches_model(
        keys in prop::collection::vec(0u32..100, 0..80),
        bounds in prop::collection::vec(0u32..110, 1..40),
    ) {
        let mut file = memory_file();
        let mut tree = tree(true);
        let mut model: Vec<(u32, u32)> = Vec::new();
        for &key in &keys {
            let address = insert(&mut tree, &mut file, key, b"").unwrap();
            model.push((key, address));
        }
        // stable: equal keys stay in insertion order
        model.sort_by_key(|&(key, _)| key);

        for bound in bounds {
            let expected = model.iter().position(|&(key, _)| key >= bound).map(|i| model.remove(i));
            let got = tree.remove_first_at_least(&mut file, &bound).unwrap();
            prop_assert_eq!(got.map(|(address, key)| (key, address)), expected);
        }
        tree.check(&mut file).unwrap();
    }
}
