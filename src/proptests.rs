use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

use crate::arena::HEADER_SIZE;
use crate::node::NODE_SIZE;
use crate::trie::State;

/// Walk every node reachable from the root and check structural invariants.
/// Returns the number of reachable nodes.
fn validate_trie(t: &Trie) -> usize {
    let State::Open(arena) = &t.state else {
        panic!("validating a released trie");
    };

    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![t.root];
    while let Some(off) = stack.pop() {
        assert!(!off.is_null(), "null offset pushed");
        assert!(seen.insert(off), "node {off} reachable twice");
        assert_eq!(
            (off.as_usize() - HEADER_SIZE) % NODE_SIZE,
            0,
            "node {off} is not on a record boundary"
        );

        let node = Node::load(arena, off);
        for (child, smaller) in [(node.left, true), (node.right, false)] {
            if child.is_null() {
                continue;
            }
            let c = Node::load(arena, child).ch;
            if smaller {
                assert!(c < node.ch, "left child {c} not below {}", node.ch);
            } else {
                assert!(c > node.ch, "right child {c} not above {}", node.ch);
            }
            stack.push(child);
        }
        if !node.mid.is_null() {
            stack.push(node.mid);
        }
    }

    // Nodes are only ever allocated by linking them in.
    assert_eq!(
        seen.len(),
        (arena.used_bytes() - HEADER_SIZE) / NODE_SIZE,
        "every allocated node must be reachable"
    );
    seen.len()
}

#[derive(Clone, Debug)]
enum Op {
    Put(Vec<u8>, u64),
    Get(Vec<u8>),
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // Small alphabet so keys share prefixes and branch often.
    prop::collection::vec(prop_oneof![Just(0u8), b'a'..=b'e', Just(0xFF)], 0..=24)
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        60 => (key.clone(), 1u64..).prop_map(|(k, v)| Op::Put(k, v)),
        40 => key.prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=1500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_btreemap(ops in ops_strategy()) {
        let mut t = Trie::with_config(&ArenaConfig::default().with_initial_capacity(64)).unwrap();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    t.put(&key, value).unwrap();
                    if !key.is_empty() {
                        m.insert(key, value);
                    }
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key).unwrap(), m.get(&key).copied().unwrap_or(0));
                }
            }
        }

        for (k, v) in &m {
            prop_assert_eq!(t.get(k).unwrap(), *v);
        }
        validate_trie(&t);
    }

    #[test]
    fn prop_size_is_monotonic(keys in prop::collection::vec(key_strategy(), 0..=300)) {
        let mut t = Trie::new().unwrap();
        let mut last = t.size();
        for (i, key) in keys.iter().enumerate() {
            t.put(key, i as u64 + 1).unwrap();
            let size = t.size();
            prop_assert!(size >= last);
            last = size;
        }
    }

    #[test]
    fn prop_overwrite_keeps_size(key in key_strategy(), v1 in 1u64.., v2 in 1u64..) {
        let mut t = Trie::new().unwrap();
        t.put(&key, v1).unwrap();
        let size = t.size();
        t.put(&key, v2).unwrap();
        prop_assert_eq!(t.size(), size);
        let expected = if key.is_empty() { 0 } else { v2 };
        prop_assert_eq!(t.get(&key).unwrap(), expected);
    }

    #[test]
    fn prop_sharded_matches_single(keys in prop::collection::vec(key_strategy(), 0..=300)) {
        let mut single = Trie::new().unwrap();
        let sharded = ShardedTrie::new(5, &ArenaConfig::default().with_initial_capacity(64)).unwrap();
        for (i, key) in keys.iter().enumerate() {
            single.put(key, i as u64 + 1).unwrap();
            sharded.put(key, i as u64 + 1).unwrap();
        }
        for key in &keys {
            prop_assert_eq!(single.get(key).unwrap(), sharded.get(key).unwrap());
        }
    }
}
