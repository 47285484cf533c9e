//! Classic open-addressing table.
//!
//! A single array of slots. The probe sequence starts at `hash & mask` and
//! continues with `i = 5i + 1 + perturb`, where `perturb` begins as the full
//! hash and is shifted right by 5 bits each step, so every bit of the hash
//! eventually takes part and, once `perturb` reaches zero, every slot is
//! visited.
//!
//! Removal leaves a tombstone. Tombstones count towards the 3/4 load limit
//! and disappear when the table is rebuilt.

use super::TableStrategy;
use crate::buffer::{Buffer, BufferToken};
use crate::error::{PoolError, PoolResult};
use crate::pool::Pool;
use crate::size_class::MAX_CAPACITY;
use ahash::RandomState;
use std::borrow::Borrow;
use std::hash::Hash;
use tracing::debug;

const PERTURB_SHIFT: u32 = 5;

/// Smallest slot count.
const MIN_SLOTS: usize = 8;

pub(crate) enum Slot<K, V> {
    Empty,
    Tombstone,
    Full { hash: u64, key: K, value: V },
}

/// Open-addressing table with perturbed probing and tombstones.
pub struct ClassicTable<K: Send + 'static, V: Send + 'static> {
    slots: Buffer<Slot<K, V>>,
    mask: usize,
    items: usize,
    tombstones: usize,
}

impl<K, V> ClassicTable<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    /// Slot count that holds `entries` under the 3/4 load limit.
    fn slots_for(entries: usize) -> PoolResult<usize> {
        let wanted = entries
            .checked_mul(4)
            .map(|n| n / 3 + 1)
            .filter(|&n| n <= MAX_CAPACITY)
            .ok_or(PoolError::CapacityOverflow {
                requested: entries,
                max: MAX_CAPACITY / 4 * 3,
            })?;
        Ok(wanted.max(MIN_SLOTS).next_power_of_two())
    }

    fn with_slots(pool: &Pool, slots: usize) -> PoolResult<Self> {
        let mut buffer = pool.rent::<Slot<K, V>>(slots)?;
        // the rented class may be larger; use all of it
        let slots = buffer.capacity();
        buffer.vec_mut().resize_with(slots, || Slot::Empty);
        Ok(Self {
            slots: buffer,
            mask: slots - 1,
            items: 0,
            tombstones: 0,
        })
    }

    #[inline]
    fn over_limit(&self, used: usize) -> bool {
        used * 4 > self.slots.len() * 3
    }

    /// Index of the slot holding `key`.
    fn find_index<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut perturb = hash;
        let mut i = hash as usize & self.mask;
        loop {
            match &self.slots[i] {
                Slot::Empty => return None,
                Slot::Full {
                    hash: stored, key: k, ..
                } if *stored == hash && k.borrow() == key => return Some(i),
                _ => {}
            }
            perturb >>= PERTURB_SHIFT;
            i = i.wrapping_mul(5).wrapping_add(1).wrapping_add(perturb as usize) & self.mask;
        }
    }

    /// First empty or tombstoned slot on the probe sequence of `hash`.
    fn insert_index(&self, hash: u64) -> usize {
        let mut perturb = hash;
        let mut i = hash as usize & self.mask;
        loop {
            if !matches!(self.slots[i], Slot::Full { .. }) {
                return i;
            }
            perturb >>= PERTURB_SHIFT;
            i = i.wrapping_mul(5).wrapping_add(1).wrapping_add(perturb as usize) & self.mask;
        }
    }

    /// Place an entry known to be absent.
    fn place(&mut self, hash: u64, key: K, value: V) {
        let i = self.insert_index(hash);
        if matches!(self.slots[i], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        self.slots[i] = Slot::Full { hash, key, value };
        self.items += 1;
    }

    /// Rebuild into a fresh buffer, dropping tombstones. Doubles the slot
    /// count unless tombstones are what pushed the table over its limit.
    fn resize(&mut self) -> PoolResult<()> {
        let current = self.slots.len();
        let wanted = if self.over_limit(self.items * 2 + 1) {
            current * 2
        } else {
            current
        };

        let mut fresh = Self::with_slots(self.slots.pool(), wanted)?;
        for slot in self.slots.vec_mut().drain(..) {
            if let Slot::Full { hash, key, value } = slot {
                fresh.place(hash, key, value);
            }
        }
        debug!(
            from = current,
            to = fresh.slots.len(),
            items = fresh.items,
            dropped_tombstones = self.tombstones,
            "classic table resized"
        );

        let old = std::mem::replace(self, fresh);
        old.slots.retire()
    }
}

impl<K, V> TableStrategy<K, V> for ClassicTable<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    type Iter<'a>
        = ClassicIter<'a, K, V>
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
        self.slots.len() / 4 * 3
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
        let i = self.find_index(hash, key)?;
        match &self.slots[i] {
            Slot::Full { key, value, .. } => Some((key, value)),
            _ => None,
        }
    }

    fn find_mut<Q>(&mut self, hash: u64, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let i = self.find_index(hash, key)?;
        match &mut self.slots[i] {
            Slot::Full { value, .. } => Some(value),
            _ => None,
        }
    }

    fn insert(
        &mut self,
        _hasher: &RandomState,
        hash: u64,
        key: K,
        value: V,
    ) -> PoolResult<Option<V>> {
        if let Some(existing) = self.find_mut(hash, &key) {
            return Ok(Some(std::mem::replace(existing, value)));
        }
        if self.over_limit(self.items + self.tombstones + 1) {
            self.resize()?;
        }
        self.place(hash, key, value);
        Ok(None)
    }

    fn remove<Q>(&mut self, hash: u64, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let i = self.find_index(hash, key)?;
        match std::mem::replace(&mut self.slots[i], Slot::Tombstone) {
            Slot::Full { key, value, .. } => {
                self.items -= 1;
                self.tombstones += 1;
                Some((key, value))
            }
            other => {
                self.slots[i] = other;
                None
            }
        }
    }

    fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        self.items = 0;
        self.tombstones = 0;
    }

    fn iter(&self) -> ClassicIter<'_, K, V> {
        ClassicIter {
            inner: self.slots.iter(),
            remaining: self.items,
        }
    }

    fn retire(self) -> PoolResult<()> {
        self.slots.retire()
    }
}

/// Entries of a [`ClassicTable`] in slot order.
pub struct ClassicIter<'a, K, V> {
    inner: std::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for ClassicIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.inner.by_ref() {
            if let Slot::Full { key, value, .. } = slot {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for ClassicIter<'_, K, V> {}
