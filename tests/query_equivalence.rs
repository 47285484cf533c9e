//! Fused query pipelines checked against the equivalent std iterator chains.

use pooled_collections::{
    AssociativeContainer, Pool, PooledDictionary, PooledList, PooledSwissDictionary, Query,
    SequenceContainer,
};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

// =============================================================================
// Helpers
// =============================================================================

fn random_source(pool: &Pool, rng: &mut Xoshiro256PlusPlus, len: usize) -> PooledList<i64> {
    let mut list = PooledList::create_in(pool, len).unwrap();
    for _ in 0..len {
        list.push(rng.random_range(-1_000..1_000));
    }
    list
}

// =============================================================================
// Lists
// =============================================================================

#[test]
fn test_filter_map_take_matches_iterator() {
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);

    for _ in 0..200 {
        let len = rng.random_range(0..300);
        let source = random_source(&pool, &mut rng, len);
        let threshold = rng.random_range(-1_000..1_000);
        let factor = rng.random_range(1..5);
        let n = rng.random_range(0..50);

        let fused = source
            .query()
            .filter(|x| **x > threshold)
            .map(|x| x * factor)
            .take(n)
            .to_pooled_list(n)
            .unwrap();
        let expected: Vec<i64> = source
            .iter()
            .filter(|x| **x > threshold)
            .map(|x| x * factor)
            .take(n)
            .collect();

        assert_eq!(fused.as_slice(), expected.as_slice());
    }
}

#[test]
fn test_stage_order_is_preserved() {
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

    for _ in 0..100 {
        let len = rng.random_range(0..200);
        let source = random_source(&pool, &mut rng, len);
        let first = rng.random_range(0..100);
        let second = rng.random_range(0..20);

        let fused = source
            .query()
            .take(first)
            .map(|x| x.abs())
            .filter(|x| x % 3 == 0)
            .take(second)
            .map(|x| x.to_string())
            .collect_pooled()
            .unwrap();
        let expected: Vec<String> = source
            .iter()
            .take(first)
            .map(|x| x.abs())
            .filter(|x| x % 3 == 0)
            .take(second)
            .map(|x| x.to_string())
            .collect();

        assert_eq!(fused.as_slice(), expected.as_slice());
    }
}

#[test]
fn test_count_matches_iterator() {
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let source = random_source(&pool, &mut rng, 1_000);

    let fused = source.query().filter(|x| **x < 0).count();
    let expected = source.iter().filter(|x| **x < 0).count();
    assert_eq!(fused, expected);
}

#[test]
fn test_query_leaves_source_intact() {
    let pool = Pool::default();
    let mut source = PooledList::create_in(&pool, 8).unwrap();
    source.extend([3, 1, 2]);

    let doubled = source.query().map(|x| x * 2).collect_pooled().unwrap();
    assert_eq!(doubled, [6, 2, 4]);
    assert_eq!(source, [3, 1, 2]);
}

#[test]
fn test_query_from_plain_iterator() {
    let pool = Pool::default();
    let words = ["alpha", "beta", "gamma", "delta", "epsilon"];

    let fused = Query::from_iter(&pool, words)
        .filter(|w| w.len() == 5)
        .map(str::to_uppercase)
        .collect_pooled()
        .unwrap();
    assert_eq!(fused, ["ALPHA", "GAMMA", "DELTA"].map(String::from));
}

// =============================================================================
// Dictionaries
// =============================================================================

#[test]
fn test_dictionary_queries_match_iterator() {
    let pool = Pool::default();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
    let mut classic = PooledDictionary::create_in(&pool, 0).unwrap();
    let mut swiss = PooledSwissDictionary::create_in(&pool, 0).unwrap();

    for _ in 0..2_000 {
        let key = rng.random_range(0..5_000u32);
        let value = rng.random_range(0..100u32);
        classic.insert(key, value);
        swiss.insert(key, value);
    }

    let mut from_classic = classic
        .query()
        .filter(|(_, v)| **v >= 50)
        .map(|(k, _)| *k)
        .collect_pooled()
        .unwrap();
    let mut from_swiss = swiss
        .query()
        .filter(|(_, v)| **v >= 50)
        .map(|(k, _)| *k)
        .collect_pooled()
        .unwrap();
    let mut expected: Vec<u32> = classic
        .iter()
        .filter(|(_, v)| **v >= 50)
        .map(|(k, _)| *k)
        .collect();

    from_classic.sort();
    from_swiss.sort();
    expected.sort();
    assert_eq!(from_classic.as_slice(), expected.as_slice());
    assert_eq!(from_swiss.as_slice(), expected.as_slice());
}
