//! Randomized equivalence tests for both hash table strategies.
//!
//! Each test drives a pooled map or set and a std collection with the same
//! seeded operation stream and checks they agree after every step.

use pooled_collections::{
    AssociativeContainer, ClassicTable, Pool, PooledMap, PooledSet, SwissTable, TableStrategy,
};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::{HashMap, HashSet};

// =============================================================================
// Helpers
// =============================================================================

/// Check length, every expected entry, and that iteration yields nothing else.
fn assert_same_map<T>(pooled: &PooledMap<u64, u64, T>, expected: &HashMap<u64, u64>)
where
    T: TableStrategy<u64, u64>,
{
    assert_eq!(pooled.len(), expected.len());
    for (key, value) in expected {
        assert_eq!(pooled.get(key), Some(value), "key {key}");
    }
    let mut seen = 0;
    for (key, value) in pooled.iter() {
        assert_eq!(expected.get(key), Some(value));
        seen += 1;
    }
    assert_eq!(seen, expected.len());
}

fn random_map_ops<T>(seed: u64, ops: usize, key_space: u64, hint: usize)
where
    T: TableStrategy<u64, u64>,
{
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut pooled = PooledMap::<u64, u64, T>::create_in(&pool, hint).unwrap();
    let mut expected = HashMap::new();

    for step in 0..ops {
        let key = rng.random_range(0..key_space);
        match rng.random_range(0..10) {
            0..=4 => {
                let value = rng.random::<u64>();
                assert_eq!(pooled.insert(key, value), expected.insert(key, value));
            }
            5..=7 => {
                assert_eq!(pooled.remove(&key), expected.remove(&key));
            }
            _ => {
                assert_eq!(pooled.get(&key), expected.get(&key));
                assert_eq!(pooled.contains_key(&key), expected.contains_key(&key));
            }
        }
        assert_eq!(pooled.len(), expected.len(), "step {step}");

        if step % 500 == 0 {
            assert_same_map(&pooled, &expected);
        }
    }

    assert_same_map(&pooled, &expected);
    pooled.dispose().unwrap();
    assert_eq!(pool.stats().lent, 0);
}

fn random_set_ops<T>(seed: u64, ops: usize, key_space: u32)
where
    T: TableStrategy<u32, ()>,
{
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut pooled = PooledSet::<u32, T>::create_in(&pool, 0).unwrap();
    let mut expected = HashSet::new();

    for _ in 0..ops {
        let key = rng.random_range(0..key_space);
        if rng.random_bool(0.6) {
            assert_eq!(pooled.insert(key), expected.insert(key));
        } else {
            assert_eq!(pooled.remove(&key), expected.remove(&key));
        }
        assert_eq!(pooled.contains(&key), expected.contains(&key));
    }

    assert_eq!(pooled.len(), expected.len());
    let collected: HashSet<u32> = pooled.iter().copied().collect();
    assert_eq!(collected, expected);
}

// =============================================================================
// Maps
// =============================================================================

#[test]
fn test_classic_matches_hashmap() {
    random_map_ops::<ClassicTable<u64, u64>>(42, 20_000, 2_000, 0);
}

#[test]
fn test_swiss_matches_hashmap() {
    random_map_ops::<SwissTable<u64, u64>>(42, 20_000, 2_000, 0);
}

#[test]
fn test_classic_small_key_space_churn() {
    // heavy tombstone churn on a table that never needs to double
    random_map_ops::<ClassicTable<u64, u64>>(7, 20_000, 16, 16);
}

#[test]
fn test_swiss_small_key_space_churn() {
    random_map_ops::<SwissTable<u64, u64>>(7, 20_000, 16, 16);
}

#[test]
fn test_both_strategies_agree_with_string_keys() {
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1234);
    let mut classic = PooledMap::<String, usize, ClassicTable<_, _>>::create_in(&pool, 4).unwrap();
    let mut swiss = PooledMap::<String, usize, SwissTable<_, _>>::create_in(&pool, 4).unwrap();

    for i in 0..5_000 {
        let key = format!("key-{}", rng.random_range(0..1_500));
        if rng.random_bool(0.7) {
            assert_eq!(classic.insert(key.clone(), i), swiss.insert(key, i));
        } else {
            assert_eq!(classic.remove(key.as_str()), swiss.remove(key.as_str()));
        }
    }

    assert_eq!(classic.len(), swiss.len());
    for (key, value) in classic.iter() {
        assert_eq!(swiss.get(key.as_str()), Some(value));
    }
}

#[test]
fn test_remove_everything_then_refill() {
    let pool = Pool::default();
    let mut map = PooledMap::<u64, u64, SwissTable<_, _>>::create_in(&pool, 0).unwrap();
    for round in 0..3 {
        for k in 0..1_000 {
            assert_eq!(map.insert(k, k + round), None);
        }
        assert_eq!(map.len(), 1_000);
        for k in 0..1_000 {
            assert_eq!(map.remove(&k), Some(k + round));
        }
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
    }
}

#[test]
fn test_generic_over_associative_container() {
    fn fill<C: AssociativeContainer<u64, u64>>(container: &mut C, n: u64) -> u64 {
        for k in 0..n {
            container.insert(k, k * k);
        }
        container.iter().map(|(_, v)| *v).sum()
    }

    let pool = Pool::default();
    let mut classic = PooledMap::<u64, u64, ClassicTable<_, _>>::create_in(&pool, 0).unwrap();
    let mut swiss = PooledMap::<u64, u64, SwissTable<_, _>>::create_in(&pool, 0).unwrap();
    let expected: u64 = (0..100).map(|k| k * k).sum();
    assert_eq!(fill(&mut classic, 100), expected);
    assert_eq!(fill(&mut swiss, 100), expected);
}

// =============================================================================
// Sets
// =============================================================================

#[test]
fn test_classic_set_matches_hashset() {
    random_set_ops::<ClassicTable<u32, ()>>(99, 10_000, 1_000);
}

#[test]
fn test_swiss_set_matches_hashset() {
    random_set_ops::<SwissTable<u32, ()>>(99, 10_000, 1_000);
}
