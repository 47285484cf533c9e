//! Contracts shared by the pooled containers.
//!
//! The query pipeline and generic helpers are written against these traits
//! once, so they work the same over a [`PooledList`](crate::PooledList) or
//! either hash table strategy.

use crate::pool::Pool;
use crate::query::{Identity, Query};

/// A container whose elements sit contiguously in one pooled buffer.
pub trait SequenceContainer<T> {
    /// Pool the container rents from.
    fn pool(&self) -> &Pool;

    /// Live elements.
    fn as_slice(&self) -> &[T];

    /// Number of elements.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the container holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a fused query over the elements, by reference.
    fn query(&self) -> Query<std::slice::Iter<'_, T>, Identity> {
        Query::new(self.pool().clone(), self.as_slice().iter())
    }
}

/// A key to value container, implemented by every map and set flavour.
///
/// Sets are containers of `K -> ()`.
pub trait AssociativeContainer<K, V> {
    /// Iterator over entries in storage order.
    type Iter<'a>: Iterator<Item = (&'a K, &'a V)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    /// Pool the container rents from.
    fn pool(&self) -> &Pool;

    /// Insert or overwrite, returning the previous value.
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    /// Value stored for `key`.
    fn get(&self, key: &K) -> Option<&V>;

    /// Whether `key` is present.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`, returning its value.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Whether the container holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in storage order.
    fn iter(&self) -> Self::Iter<'_>;

    /// Start a fused query over the entries.
    fn query(&self) -> Query<Self::Iter<'_>, Identity> {
        Query::new(self.pool().clone(), self.iter())
    }
}
