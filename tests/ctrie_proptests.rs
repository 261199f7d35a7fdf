//! Property-based tests for `Ctrie`.
//!
//! Differential testing against `HashMap` as an oracle, under hash functions
//! that produce every trie shape: well-spread (mostly shallow C-nodes),
//! identity (deep chains for keys sharing low bits), narrow (list nodes
//! after a couple of levels) and constant (a single list node).

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use std::collections::{HashMap, HashSet};

use common::{constant_hash, identity_hash};
use ctrie::{Ctrie, HashFunction, Truncated};
use proptest::prelude::*;

// ============================================================================
//  Strategies
// ============================================================================

/// Operations for random testing.
#[derive(Debug, Clone)]
enum Op {
    Insert(u64, u64),
    Lookup(u64),
    Remove(u64),
}

/// Keys from a small domain so operations hit the same keys repeatedly.
fn small_key() -> impl Strategy<Value = u64> + Clone {
    0u64..64
}

/// Keys that share long low-bit prefixes (deep chains under identity hashing).
fn prefixed_key() -> impl Strategy<Value = u64> + Clone {
    (0u64..8, 0u32..64).prop_map(|(low, shift)| low | (1u64 << shift))
}

fn operations<S>(keys: S, max_ops: usize) -> impl Strategy<Value = Vec<Op>>
where
    S: Strategy<Value = u64> + Clone,
{
    prop::collection::vec(
        prop_oneof![
            3 => (keys.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
            2 => keys.clone().prop_map(Op::Lookup),
            2 => keys.prop_map(Op::Remove),
        ],
        0..=max_ops,
    )
}

/// Apply `ops` to a trie and to a `HashMap`, comparing every result.
fn check_against_oracle<H>(trie: &Ctrie<u64, u64, H>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    H: HashFunction<u64>,
{
    let mut oracle: HashMap<u64, u64> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(key, value) => {
                prop_assert_eq!(
                    trie.insert(key, value).map(|v| *v),
                    oracle.insert(key, value),
                    "insert mismatch for key {}",
                    key
                );
            }

            Op::Lookup(key) => {
                prop_assert_eq!(
                    trie.lookup(&key).map(|v| *v),
                    oracle.get(&key).copied(),
                    "lookup mismatch for key {}",
                    key
                );
            }

            Op::Remove(key) => {
                prop_assert_eq!(
                    trie.remove(&key).map(|v| *v),
                    oracle.remove(&key),
                    "remove mismatch for key {}",
                    key
                );
            }
        }
    }

    prop_assert_eq!(trie.len(), oracle.len(), "length mismatch");

    let guard = trie.guard();
    let seen: HashMap<u64, u64> = trie.iter(&guard).map(|(k, v)| (*k, *v)).collect();
    prop_assert_eq!(seen, oracle, "iteration mismatch");

    Ok(())
}

// ============================================================================
//  Differential Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Random operation sequences match `HashMap` with the default hasher.
    #[test]
    fn differential_default_hasher(ops in operations(small_key(), 200)) {
        let trie: Ctrie<u64, u64> = Ctrie::new();
        check_against_oracle(&trie, ops)?;
    }

    /// Identity hashing over prefix-sharing keys builds and collapses deep chains.
    #[test]
    fn differential_deep_chains(ops in operations(prefixed_key(), 200)) {
        let trie = Ctrie::with_hasher(identity_hash);
        check_against_oracle(&trie, ops)?;
    }

    /// A 7-bit hash forces list nodes after two levels.
    #[test]
    fn differential_narrow_hash(ops in operations(any::<u64>().prop_map(|k| k % 512), 200)) {
        let trie = Ctrie::with_hasher(Truncated::new(identity_hash, 7));
        check_against_oracle(&trie, ops)?;
    }

    /// A constant hash puts every key into one list node.
    #[test]
    fn differential_constant_hash(ops in operations(small_key(), 150)) {
        let trie = Ctrie::with_hasher(constant_hash);
        check_against_oracle(&trie, ops)?;
    }
}

// ============================================================================
//  Structural Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Removing everything leaves an empty trie, whatever the insert order.
    #[test]
    fn remove_all_empties_trie(keys in prop::collection::hash_set(prefixed_key(), 0..64)) {
        let trie = Ctrie::with_hasher(identity_hash);
        for &key in &keys {
            trie.insert(key, key);
        }

        for &key in &keys {
            prop_assert_eq!(trie.remove(&key).map(|v| *v), Some(key));
        }

        prop_assert!(trie.is_empty());
        prop_assert_eq!(trie.iter(&trie.guard()).count(), 0);
    }

    /// Removing one key never disturbs any other.
    #[test]
    fn remove_preserves_siblings(
        keys in prop::collection::hash_set(prefixed_key(), 2..32),
        pick in any::<prop::sample::Index>(),
    ) {
        let keys: Vec<u64> = keys.into_iter().collect();
        let victim = keys[pick.index(keys.len())];

        let trie = Ctrie::with_hasher(identity_hash);
        for &key in &keys {
            trie.insert(key, !key);
        }
        trie.remove(&victim);

        for &key in keys.iter().filter(|&&k| k != victim) {
            prop_assert_eq!(trie.lookup(&key).map(|v| *v), Some(!key));
        }
        prop_assert!(trie.lookup(&victim).is_none());
    }

    /// Iteration yields each key exactly once.
    #[test]
    fn iter_yields_unique_keys(
        pairs in prop::collection::vec((small_key(), any::<u64>()), 0..100),
    ) {
        let trie: Ctrie<u64, u64> = pairs.iter().copied().collect();
        let guard = trie.guard();

        let keys: Vec<u64> = trie.keys(&guard).copied().collect();
        let unique: HashSet<u64> = keys.iter().copied().collect();

        prop_assert_eq!(keys.len(), unique.len());
        prop_assert_eq!(keys.len(), trie.len());
        prop_assert_eq!(unique, pairs.iter().map(|(k, _)| *k).collect::<HashSet<u64>>());
    }

    /// The last write for each key is the one that sticks.
    #[test]
    fn last_write_wins(pairs in prop::collection::vec((small_key(), any::<u64>()), 1..100)) {
        let trie: Ctrie<u64, u64> = Ctrie::new();
        let mut last: HashMap<u64, u64> = HashMap::new();

        for &(key, value) in &pairs {
            trie.insert(key, value);
            last.insert(key, value);
        }

        for (key, value) in &last {
            prop_assert_eq!(*trie.lookup(key).unwrap(), *value);
        }
    }
}
