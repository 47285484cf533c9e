//! Pooled hash sets: the key-only twins of the pooled dictionaries.

use crate::buffer::{BufferToken, ViewPin};
use crate::error::PoolResult;
use crate::map::PooledMap;
use crate::pool::Pool;
use crate::table::{ClassicTable, SwissTable, TableStrategy};
use crate::traits::AssociativeContainer;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

/// Set over the classic open-addressing table.
pub type PooledHashSet<K> = PooledSet<K, ClassicTable<K, ()>>;

/// Set over the swiss grouped-control-byte table.
pub type PooledSwissSet<K> = PooledSet<K, SwissTable<K, ()>>;

/// Hash set whose table is rented from a [`Pool`].
pub struct PooledSet<K, T = ClassicTable<K, ()>>
where
    K: Hash + Eq + Send + 'static,
    T: TableStrategy<K, ()>,
{
    map: PooledMap<K, (), T>,
}

impl<K, T> PooledSet<K, T>
where
    K: Hash + Eq + Send + 'static,
    T: TableStrategy<K, ()>,
{
    /// Create a set in the global pool sized for `hint` keys.
    pub fn create(hint: usize) -> PoolResult<Self> {
        Self::create_in(&Pool::global(), hint)
    }

    /// Create a set in `pool` sized for `hint` keys.
    pub fn create_in(pool: &Pool, hint: usize) -> PoolResult<Self> {
        Ok(Self {
            map: PooledMap::create_in(pool, hint)?,
        })
    }

    /// Add `key`. Returns `true` if it was not already present.
    ///
    /// # Panics
    ///
    /// Panics if the table must grow and the pool cannot provide a larger
    /// buffer.
    #[track_caller]
    pub fn insert(&mut self, key: K) -> bool {
        self.map.insert(key, ()).is_none()
    }

    /// Add `key`. Returns `true` if it was not already present.
    pub fn try_insert(&mut self, key: K) -> PoolResult<bool> {
        Ok(self.map.try_insert(key, ())?.is_none())
    }

    /// Whether `key` is present.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// The stored key equal to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_key_value(key).map(|(k, _)| k)
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key).is_some()
    }

    /// Remove and return the stored key equal to `key`.
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove_entry(key).map(|(k, _)| k)
    }

    /// Number of keys.
    #[track_caller]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the set is empty.
    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keys the set holds before its table grows.
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Keys in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.map.keys()
    }

    /// Add every key from `iter`.
    pub fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.map.extend(iter.into_iter().map(|k| (k, ())));
    }

    /// Pool the set rents from.
    pub fn pool(&self) -> &Pool {
        self.map.pool()
    }

    /// Token of the buffer currently in use.
    pub fn token(&self) -> BufferToken {
        self.map.token()
    }

    /// Pin the current buffer, see [`PooledMap::pin`].
    pub fn pin(&self) -> PoolResult<ViewPin> {
        self.map.pin()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.map.is_disposed()
    }

    /// Retire the set's buffers. A second call is a
    /// [`DoubleRelease`](crate::PoolError::DoubleRelease).
    pub fn dispose(&mut self) -> PoolResult<()> {
        self.map.dispose()
    }
}

impl<K, T> AssociativeContainer<K, ()> for PooledSet<K, T>
where
    K: Hash + Eq + Send + 'static,
    T: TableStrategy<K, ()>,
{
    type Iter<'a>
        = T::Iter<'a>
    where
        Self: 'a,
        K: 'a;

    fn pool(&self) -> &Pool {
        self.map.pool()
    }

    fn insert(&mut self, key: K, _value: ()) -> Option<()> {
        self.map.insert(key, ())
    }

    fn get(&self, key: &K) -> Option<&()> {
        self.map.get(key)
    }

    fn remove(&mut self, key: &K) -> Option<()> {
        self.map.remove(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn iter(&self) -> T::Iter<'_> {
        self.map.iter()
    }
}

impl<K, T> fmt::Debug for PooledSet<K, T>
where
    K: Hash + Eq + Send + 'static + fmt::Debug,
    T: TableStrategy<K, ()>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.map.is_disposed() {
            return f.write_str("PooledSet(disposed)");
        }
        f.debug_set().entries(self.iter()).finish()
    }
}
