//! Swiss-style table: grouped control bytes in front of the slot array.
//!
//! The control array runs parallel to the slots and is split into aligned
//! groups of [`GROUP_WIDTH`]. A lookup loads one group at a time, matches
//! the 7-bit hash fragment against all 16 control bytes at once and only
//! compares keys for the candidates that match. Groups are visited in a
//! triangular sequence; the search ends at the first group that still has
//! an `EMPTY` byte.
//!
//! The table grows once 7/8 of its slots have been consumed. `DELETED`
//! bytes only appear when a slot's group is completely without `EMPTY`
//! bytes; in every other case removal restores `EMPTY` directly, since no
//! probe sequence can pass through such a group.

use super::TableStrategy;
use super::group::{DELETED, EMPTY, GROUP_WIDTH, Group, ProbeSeq, h2, is_full};
use crate::buffer::{Buffer, BufferToken};
use crate::error::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::size_class::MAX_CAPACITY;
use ahash::RandomState;
use std::borrow::Borrow;
use std::hash::Hash;
use tracing::debug;

/// Grouped control-byte table.
pub struct SwissTable<K: Send + 'static, V: Send + 'static> {
    ctrl: Buffer<u8>,
    slots: Buffer<Option<(K, V)>>,
    group_mask: usize,
    items: usize,
    growth_left: usize,
}

/// Entries a table with `slots` slots holds before it must grow.
#[inline]
fn capacity_for(slots: usize) -> usize {
    slots / 8 * 7
}

impl<K, V> SwissTable<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    /// Slot count that holds `entries` under the 7/8 load limit.
    fn slots_for(entries: usize) -> PoolResult<usize> {
        let wanted = entries
            .checked_mul(8)
            .map(|n| n / 7 + 1)
            .filter(|&n| n <= MAX_CAPACITY)
            .ok_or(PoolError::CapacityOverflow {
                requested: entries,
                max: capacity_for(MAX_CAPACITY),
            })?;
        Ok(wanted.max(GROUP_WIDTH).next_power_of_two())
    }

    fn with_slots(pool: &Pool, slots: usize) -> PoolResult<Self> {
        let mut entries = pool.rent::<Option<(K, V)>>(slots)?;
        let slots = entries.capacity();
        entries.vec_mut().resize_with(slots, || None);

        let mut ctrl = pool.rent::<u8>(slots)?;
        ctrl.vec_mut().resize(slots, EMPTY);

        Ok(Self {
            ctrl,
            slots: entries,
            group_mask: slots / GROUP_WIDTH - 1,
            items: 0,
            growth_left: capacity_for(slots),
        })
    }

    #[inline]
    fn group(&self, group: usize) -> Group {
        Group::load(&self.ctrl[group * GROUP_WIDTH..])
    }

    fn find_index<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let fragment = h2(hash);
        let mut seq = ProbeSeq::new(hash, self.group_mask);
        loop {
            let group = self.group(seq.group);
            for bit in group.match_byte(fragment) {
                let index = seq.group * GROUP_WIDTH + bit;
                if let Some((k, _)) = &self.slots[index] {
                    if k.borrow() == key {
                        return Some(index);
                    }
                }
            }
            if group.match_empty().any_bit_set() || !seq.move_next() {
                return None;
            }
        }
    }

    /// First EMPTY or DELETED slot on the probe sequence of `hash`.
    fn insert_index(&self, hash: u64) -> usize {
        let mut seq = ProbeSeq::new(hash, self.group_mask);
        loop {
            if let Some(bit) = self.group(seq.group).match_empty_or_deleted().lowest_set_bit() {
                return seq.group * GROUP_WIDTH + bit;
            }
            // growth_left keeps at least one slot in eight EMPTY
            let advanced = seq.move_next();
            debug_assert!(advanced, "swiss table has no free slot");
        }
    }

    /// Place an entry known to be absent. The caller has made room.
    fn place(&mut self, hash: u64, key: K, value: V) {
        let index = self.insert_index(hash);
        if self.ctrl[index] == EMPTY {
            self.growth_left -= 1;
        }
        self.ctrl[index] = h2(hash);
        self.slots[index] = Some((key, value));
        self.items += 1;
    }

    /// Rebuild into fresh buffers. Doubles the slot count unless DELETED
    /// bytes are what used up the growth budget.
    fn resize(&mut self, hasher: &RandomState) -> PoolResult<()> {
        let current = self.slots.len();
        let wanted = if (self.items + 1) * 2 > capacity_for(current) {
            current * 2
        } else {
            current
        };

        let mut fresh = Self::with_slots(self.slots.pool(), wanted)?;
        for (ctrl, slot) in self.ctrl.iter().zip(self.slots.vec_mut().drain(..)) {
            if !is_full(*ctrl) {
                continue;
            }
            if let Some((key, value)) = slot {
                fresh.place(hasher.hash_one(&key), key, value);
            }
        }
        debug!(
            from = current,
            to = fresh.slots.len(),
            items = fresh.items,
            "swiss table resized"
        );

        let old = std::mem::replace(self, fresh);
        old.slots.retire()?;
        old.ctrl.retire()
    }
}

impl<K, V> TableStrategy<K, V> for SwissTable<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    type Iter<'a>
        = SwissIter<'a, K, V>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn with_capacity_in(pool: &Pool, hint: usize) -> PoolResult<Self> {
        Self::with_slots(pool, Self::slots_for(hint)?)
    }

    #[inline]
    fn len(&self) -> usize {
        self.items
    }

    #[inline]
    fn capacity(&self) -> usize {
        capacity_for(self.slots.len())
    }

    #[inline]
    fn slots(&self) -> usize {
        self.slots.len()
    }

    fn pool(&self) -> &Pool {
        self.slots.pool()
    }

    fn token(&self) -> BufferToken {
        self.slots.token()
    }

    fn find<Q>(&self, hash: u64, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.find_index(hash, key)?;
        self.slots[index].as_ref().map(|(k, v)| (k, v))
    }

    fn find_mut<Q>(&mut self, hash: u64, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.find_index(hash, key)?;
        self.slots[index].as_mut().map(|(_, v)| v)
    }

    fn insert(
        &mut self,
        hasher: &RandomState,
        hash: u64,
        key: K,
        value: V,
    ) -> PoolResult<Option<V>> {
        if let Some(existing) = self.find_mut(hash, &key) {
            return Ok(Some(std::mem::replace(existing, value)));
        }
        let index = self.insert_index(hash);
        if self.ctrl[index] == EMPTY && self.growth_left == 0 {
            self.resize(hasher)?;
        }
        self.place(hash, key, value);
        Ok(None)
    }

    fn remove<Q>(&mut self, hash: u64, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.find_index(hash, key)?;
        let group = index / GROUP_WIDTH;
        if self.group(group).match_empty().any_bit_set() {
            self.ctrl[index] = EMPTY;
            self.growth_left += 1;
        } else {
            self.ctrl[index] = DELETED;
        }
        self.items -= 1;
        self.slots[index].take()
    }

    fn clear(&mut self) {
        self.ctrl.fill(EMPTY);
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.items = 0;
        self.growth_left = capacity_for(self.slots.len());
    }

    fn iter(&self) -> SwissIter<'_, K, V> {
        SwissIter {
            ctrl: &self.ctrl,
            slots: &self.slots,
            group: 0,
            full: self.group(0).match_full(),
            remaining: self.items,
        }
    }

    fn retire(self) -> PoolResult<()> {
        self.slots.retire()?;
        self.ctrl.retire()
    }
}

/// Entries of a [`SwissTable`] in slot order, found a group at a time.
pub struct SwissIter<'a, K, V> {
    ctrl: &'a [u8],
    slots: &'a [Option<(K, V)>],
    group: usize,
    full: super::group::BitMask,
    remaining: usize,
}

impl<'a, K, V> Iterator for SwissIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            if let Some(bit) = self.full.next() {
                let index = self.group * GROUP_WIDTH + bit;
                if let Some((k, v)) = &self.slots[index] {
                    self.remaining -= 1;
                    return Some((k, v));
                }
                continue;
            }
            self.group += 1;
            let base = self.group * GROUP_WIDTH;
            if base >= self.ctrl.len() {
                break;
            }
            self.full = Group::load(&self.ctrl[base..]).match_full();
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for SwissIter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::hash_builder;

    fn table(hint: usize) -> (SwissTable<String, usize>, RandomState) {
        let pool = Pool::default();
        (
            SwissTable::with_capacity_in(&pool, hint).unwrap(),
            hash_builder(),
        )
    }

    fn insert(t: &mut SwissTable<String, usize>, h: &RandomState, k: &str, v: usize) -> Option<usize> {
        t.insert(h, h.hash_one(k), k.to_string(), v).unwrap()
    }

    fn get<'a>(t: &'a SwissTable<String, usize>, h: &RandomState, k: &str) -> Option<&'a usize> {
        t.find(h.hash_one(k), k).map(|(_, v)| v)
    }

    #[test]
    fn test_slot_sizing() {
        assert_eq!(SwissTable::<u8, u8>::slots_for(0).unwrap(), 16);
        assert_eq!(SwissTable::<u8, u8>::slots_for(14).unwrap(), 32);
        assert_eq!(SwissTable::<u8, u8>::slots_for(100).unwrap(), 128);
        assert!(SwissTable::<u8, u8>::slots_for(usize::MAX).is_err());
    }

    #[test]
    fn test_insert_find_overwrite() {
        let (mut t, h) = table(16);
        assert_eq!(insert(&mut t, &h, "a", 1), None);
        assert_eq!(insert(&mut t, &h, "a", 2), Some(1));
        assert_eq!(get(&t, &h, "a"), Some(&2));
        assert_eq!(get(&t, &h, "b"), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_growth_keeps_entries() {
        let (mut t, h) = table(16);
        let initial = t.slots();
        for i in 0..1000 {
            insert(&mut t, &h, &format!("k{i}"), i);
        }
        assert_eq!(t.len(), 1000);
        assert!(t.slots() >= initial * 4);
        assert!(t.len() <= t.capacity());
        for i in 0..1000 {
            assert_eq!(get(&t, &h, &format!("k{i}")), Some(&i));
        }
        assert_eq!(get(&t, &h, "k1000"), None);
    }

    #[test]
    fn test_remove_restores_empty_in_open_group() {
        let (mut t, h) = table(4);
        insert(&mut t, &h, "x", 1);
        assert_eq!(t.growth_left, 13);
        let hash = h.hash_one("x");
        assert_eq!(t.remove(hash, "x"), Some(("x".to_string(), 1)));
        assert_eq!(t.growth_left, 14);
        assert!(t.ctrl.iter().all(|&c| c == EMPTY));
        assert_eq!(t.remove(hash, "x"), None);
    }

    #[test]
    fn test_remove_in_full_group_marks_deleted() {
        let (mut t, h) = table(0);
        let mut k = 0;
        // a single group table fills until growth_left reaches zero
        while t.growth_left > 0 {
            insert(&mut t, &h, &k.to_string(), k);
            k += 1;
        }
        assert_eq!(t.slots(), GROUP_WIDTH);

        // force the last two EMPTY bytes away by hand to simulate a full group
        for c in t.ctrl.iter_mut() {
            if *c == EMPTY {
                *c = DELETED;
            }
        }
        let hash = h.hash_one("0");
        let index = t.find_index(hash, "0").unwrap();
        t.remove(hash, "0");
        assert_eq!(t.ctrl[index], DELETED);
    }

    #[test]
    fn test_churn_rehashes_without_growing() {
        let (mut t, h) = table(100);
        let slots = t.slots();
        for i in 0..5000 {
            let key = format!("churn{i}");
            insert(&mut t, &h, &key, i);
            t.remove(h.hash_one(key.as_str()), key.as_str());
        }
        assert_eq!(t.len(), 0);
        assert_eq!(t.slots(), slots);
    }

    #[test]
    fn test_iter_and_clear() {
        let (mut t, h) = table(40);
        for i in 0..40 {
            insert(&mut t, &h, &format!("{i}"), i);
        }
        let mut values: Vec<usize> = t.iter().map(|(_, v)| *v).collect();
        values.sort_unstable();
        assert_eq!(values, (0..40).collect::<Vec<_>>());
        assert_eq!(t.iter().len(), 40);

        t.clear();
        assert_eq!(t.iter().count(), 0);
        assert_eq!(t.growth_left, t.capacity());
    }

    #[test]
    fn test_resize_retires_both_buffers() {
        let pool = Pool::default();
        let h = hash_builder();
        let mut t = SwissTable::<u32, u32>::with_capacity_in(&pool, 0).unwrap();
        for k in 0..15 {
            t.insert(&h, h.hash_one(k), k, k).unwrap();
        }
        assert_eq!(pool.quarantined(), 2);
        t.retire().unwrap();
        assert_eq!(pool.quarantined(), 4);
    }
}
