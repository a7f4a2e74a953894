//! Property-based tests for the `tree` module.
//!
//! These tests verify invariants and properties that should hold for all
//! inputs. Uses differential testing against `BTreeMap` as an oracle: the
//! tree and the map receive the same operation sequence and must agree on
//! contents and visit order at every quiescent point, while the tree must
//! also satisfy its structural invariants.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;

use tagtree::{Key, KeyTag, TagTree, TreeError, TypeWindow};

// ============================================================================
//  Strategies
// ============================================================================

/// Small payload domains keep key collisions frequent enough to exercise
/// the duplicate/veto paths.
fn arb_key() -> impl Strategy<Value = Key> {
    prop_oneof![
        1 => any::<bool>().prop_map(Key::Bool),
        4 => (-20i64..20).prop_map(Key::Int),
        4 => (0u64..40).prop_map(Key::Uint),
        2 => (-8i32..8).prop_map(|v| Key::Float(f64::from(v) / 2.0)),
        3 => "[a-d]{0,3}".prop_map(Key::Str),
        2 => prop::collection::vec(0u8..4, 0..3).prop_map(Key::Bytes),
        1 => Just(Key::Any),
    ]
}

fn arb_window() -> impl Strategy<Value = TypeWindow> {
    let tags = || {
        prop::sample::select(vec![
            KeyTag::Bool,
            KeyTag::Int,
            KeyTag::Uint,
            KeyTag::Float,
            KeyTag::Str,
            KeyTag::Bytes,
            KeyTag::Any,
        ])
    };
    (tags(), tags()).prop_map(|(a, b)| {
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        TypeWindow::new(min, max).unwrap()
    })
}

/// Operations for random testing.
#[derive(Debug, Clone)]
enum Op {
    Create(Key, u64),
    CreateOrFind(Key, u64),
    Delete(Key),
    VetoedDelete(Key),
    Destroy(Key),
}

fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (arb_key(), any::<u64>()).prop_map(|(k, v)| Op::Create(k, v)),
            2 => (arb_key(), any::<u64>()).prop_map(|(k, v)| Op::CreateOrFind(k, v)),
            3 => arb_key().prop_map(Op::Delete),
            1 => arb_key().prop_map(Op::VetoedDelete),
            1 => arb_key().prop_map(Op::Destroy),
        ],
        0..=max_ops,
    )
}

fn tree_orders() -> impl Strategy<Value = usize> {
    2usize..=6
}

// ============================================================================
//  Helpers
// ============================================================================

fn contents(tree: &TagTree<u64>) -> Vec<(Key, u64)> {
    let mut out = Vec::new();
    tree.iterate(|k, v| {
        out.push((k.clone(), *v));
        true
    });
    out
}

fn apply(tree: &TagTree<u64>, oracle: &mut BTreeMap<Key, u64>, op: &Op) {
    match op {
        Op::Create(key, value) => {
            let result = tree.create(key.clone(), || Ok(*value));
            if oracle.contains_key(key) {
                assert!(matches!(result, Err(TreeError::KeyAlreadyExists)));
            } else {
                result.unwrap();
                oracle.insert(key.clone(), *value);
            }
        }

        Op::CreateOrFind(key, value) => {
            let mut found = None;
            tree.create_or_find(key.clone(), || Ok(*value), |v| found = Some(*v))
                .unwrap();
            match oracle.get(key) {
                Some(existing) => assert_eq!(found, Some(*existing)),
                None => {
                    assert_eq!(found, None);
                    oracle.insert(key.clone(), *value);
                }
            }
        }

        Op::Delete(key) => {
            tree.delete(key, None).unwrap();
            oracle.remove(key);
        }

        Op::VetoedDelete(key) => {
            tree.delete(key, Some(&|_| false)).unwrap();
            // Vetoed: the oracle is untouched too.
        }

        Op::Destroy(key) => {
            tree.destroy(key, None).unwrap();
            oracle.remove(key);
        }
    }
}

// ============================================================================
//  Differential properties
// ============================================================================

proptest! {
    /// Any operation sequence leaves the tree balanced and agreeing with
    /// the oracle, entries visited in ascending key order.
    #[test]
    fn random_ops_match_oracle(order in tree_orders(), ops in operations(120)) {
        let tree = TagTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();

        for op in &ops {
            apply(&tree, &mut oracle, op);
            common::assert_balanced(&tree);
        }

        let expected: Vec<(Key, u64)> =
            oracle.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(contents(&tree), expected);
        prop_assert_eq!(tree.is_empty(), oracle.is_empty());
    }

    /// Round-trip: a created value is found again through `find`.
    #[test]
    fn create_then_find_round_trips(order in tree_orders(), key in arb_key(), value in any::<u64>()) {
        let tree = TagTree::new(order).unwrap();
        tree.create(key.clone(), || Ok(value)).unwrap();

        let mut found = None;
        tree.find(&key, TypeWindow::all(), |k, v| {
            if *k == key {
                found = Some(*v);
            }
            true
        });
        prop_assert_eq!(found, Some(value));
    }

    /// A vetoed delete never changes tree shape or contents.
    #[test]
    fn vetoed_delete_changes_nothing(order in tree_orders(), ops in operations(60), victim in arb_key()) {
        let tree = TagTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();
        for op in &ops {
            apply(&tree, &mut oracle, op);
        }

        let before_shape = tree.levels();
        let before_contents = contents(&tree);

        tree.delete(&victim, Some(&|_| false)).unwrap();

        prop_assert_eq!(tree.levels(), before_shape);
        prop_assert_eq!(contents(&tree), before_contents);
    }

    /// Window-filtered iteration visits exactly the oracle's keys with
    /// in-window tags, ascending.
    #[test]
    fn iterate_match_type_respects_the_window(
        order in tree_orders(),
        ops in operations(80),
        window in arb_window(),
    ) {
        let tree = TagTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();
        for op in &ops {
            apply(&tree, &mut oracle, op);
        }

        let mut visited = Vec::new();
        tree.iterate_match_type(window, |k, _| {
            visited.push(k.clone());
            true
        });

        let expected: Vec<Key> = oracle
            .keys()
            .filter(|k| window.contains(k.tag()))
            .cloned()
            .collect();
        prop_assert_eq!(visited, expected);
    }

    /// The ordered find variants agree with filtering the oracle.
    #[test]
    fn find_variants_agree_with_the_oracle(
        order in tree_orders(),
        ops in operations(80),
        reference in arb_key(),
        window in arb_window(),
    ) {
        let tree = TagTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();
        for op in &ops {
            apply(&tree, &mut oracle, op);
        }

        let in_window: Vec<Key> = oracle
            .keys()
            .filter(|k| window.contains(k.tag()))
            .cloned()
            .collect();

        let mut lt = Vec::new();
        tree.find_less_than(&reference, window, |k, _| {
            lt.push(k.clone());
            true
        });
        let expected: Vec<Key> = in_window.iter().filter(|k| *k < &reference).cloned().collect();
        prop_assert_eq!(lt, expected);

        let mut le = Vec::new();
        tree.find_less_than_or_equal(&reference, window, |k, _| {
            le.push(k.clone());
            true
        });
        let expected: Vec<Key> = in_window.iter().filter(|k| *k <= &reference).cloned().collect();
        prop_assert_eq!(le, expected);

        let mut gt = Vec::new();
        tree.find_greater_than(&reference, window, |k, _| {
            gt.push(k.clone());
            true
        });
        let expected: Vec<Key> = in_window.iter().filter(|k| *k > &reference).cloned().collect();
        prop_assert_eq!(gt, expected);

        let mut ge = Vec::new();
        tree.find_greater_than_or_equal(&reference, window, |k, _| {
            ge.push(k.clone());
            true
        });
        let expected: Vec<Key> = in_window.iter().filter(|k| *k >= &reference).cloned().collect();
        prop_assert_eq!(ge, expected);

        let mut ne = Vec::new();
        tree.find_not_equal(&reference, window, |k, _| {
            ne.push(k.clone());
            true
        });
        let expected: Vec<Key> = in_window.iter().filter(|k| *k != &reference).cloned().collect();
        prop_assert_eq!(ne, expected);
    }

    /// Early termination visits exactly the requested prefix and leaves
    /// the tree fully usable.
    #[test]
    fn early_termination_is_exact(order in tree_orders(), ops in operations(80), limit in 0usize..10) {
        let tree = TagTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();
        for op in &ops {
            apply(&tree, &mut oracle, op);
        }

        let mut visited = Vec::new();
        tree.iterate(|k, _| {
            visited.push(k.clone());
            visited.len() < limit
        });

        let expected: Vec<Key> = oracle.keys().take(limit.max(usize::from(!oracle.is_empty()))).cloned().collect();
        // With limit == 0 the first visit still happens (the callback
        // decides after seeing the entry).
        prop_assert_eq!(visited, expected);

        // No lock may leak: a mutation must still get through.
        tree.delete(&Key::Int(0), None).unwrap();
    }

    /// `destroy_all` with a veto that admits the first `quota` deletions
    /// commits exactly those and leaves a balanced remainder.
    #[test]
    fn destroy_all_partial_commit(order in tree_orders(), ops in operations(80), quota in 0usize..20) {
        let tree = TagTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();
        for op in &ops {
            apply(&tree, &mut oracle, op);
        }

        let admitted = std::cell::Cell::new(0usize);
        tree.destroy_all(Some(&|_| {
            if admitted.get() < quota {
                admitted.set(admitted.get() + 1);
                true
            } else {
                false
            }
        }))
        .unwrap();

        common::assert_balanced(&tree);

        // Keys are deleted in ascending order; the survivors are the tail.
        let expected: Vec<(Key, u64)> = oracle
            .iter()
            .skip(quota.min(oracle.len()))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        prop_assert_eq!(contents(&tree), expected);
    }
}
