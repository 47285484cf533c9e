//! Pooled dictionaries.
//!
//! [`PooledMap`] hashes keys with `ahash` and delegates storage and probing
//! to a [`TableStrategy`]. Two flavours are exported:
//!
//! - [`PooledDictionary`] - classic table, 3/4 load limit
//! - [`PooledSwissDictionary`] - swiss table, 7/8 load limit
//!
//! ```
//! use pooled_collections::{Pool, PooledSwissDictionary};
//!
//! let pool = Pool::default();
//! let mut ages = PooledSwissDictionary::create_in(&pool, 16).unwrap();
//! ages.insert("ada", 36);
//! ages.insert("alan", 41);
//! assert_eq!(ages.get("ada"), Some(&36));
//! ages.dispose().unwrap();
//! ```

use crate::buffer::{BufferId, BufferToken, ViewPin};
use crate::error::{PoolError, PoolResult, growth_failed, use_after_dispose};
use crate::pool::Pool;
use crate::table::{ClassicTable, SwissTable, TableStrategy, hash_builder};
use crate::traits::AssociativeContainer;
use ahash::RandomState;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::Index;

/// Dictionary over the classic open-addressing table.
pub type PooledDictionary<K, V> = PooledMap<K, V, ClassicTable<K, V>>;

/// Dictionary over the swiss grouped-control-byte table.
pub type PooledSwissDictionary<K, V> = PooledMap<K, V, SwissTable<K, V>>;

const NAME: &str = "pooled map";

/// Hash map whose tables are rented from a [`Pool`].
///
/// Dropping the map retires its buffers; [`dispose`](Self::dispose) does
/// the same explicitly and reports a second call as
/// [`PoolError::DoubleRelease`]. Any other use after `dispose` panics.
pub struct PooledMap<K, V, T = ClassicTable<K, V>>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    T: TableStrategy<K, V>,
{
    table: Option<T>,
    hasher: RandomState,
    disposed: Option<BufferId>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, T> PooledMap<K, V, T>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    T: TableStrategy<K, V>,
{
    /// Create a map in the global pool sized for `hint` entries.
    pub fn create(hint: usize) -> PoolResult<Self> {
        Self::create_in(&Pool::global(), hint)
    }

    /// Create a map in `pool` sized for `hint` entries.
    pub fn create_in(pool: &Pool, hint: usize) -> PoolResult<Self> {
        Ok(Self {
            table: Some(T::with_capacity_in(pool, hint)?),
            hasher: hash_builder(),
            disposed: None,
            _marker: PhantomData,
        })
    }

    #[inline]
    #[track_caller]
    fn table(&self) -> &T {
        match &self.table {
            Some(table) => table,
            None => use_after_dispose(NAME),
        }
    }

    #[inline]
    #[track_caller]
    fn table_mut(&mut self) -> &mut T {
        match &mut self.table {
            Some(table) => table,
            None => use_after_dispose(NAME),
        }
    }

    #[inline]
    fn hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Insert or overwrite, returning the previous value.
    ///
    /// # Panics
    ///
    /// Panics if the table needs to grow and the pool cannot provide a
    /// larger buffer. Use [`try_insert`](Self::try_insert) to handle that.
    #[track_caller]
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.try_insert(key, value) {
            Ok(previous) => previous,
            Err(e) => growth_failed(NAME, e),
        }
    }

    /// Insert or overwrite, returning the previous value.
    pub fn try_insert(&mut self, key: K, value: V) -> PoolResult<Option<V>> {
        let hash = self.hash(&key);
        let hasher = &self.hasher;
        match &mut self.table {
            Some(table) => table.insert(hasher, hash, key, value),
            None => use_after_dispose(NAME),
        }
    }

    /// Value stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table().find(self.hash(key), key)
    }

    /// Mutable value stored for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.table_mut().find_mut(hash, key)
    }

    /// Whether `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }

    /// Remove `key`, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Remove `key`, returning the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.table_mut().remove(hash, key)
    }

    /// Number of entries.
    #[track_caller]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether the map is empty.
    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries the map holds before its table grows.
    #[track_caller]
    pub fn capacity(&self) -> usize {
        self.table().capacity()
    }

    /// Remove every entry. The table keeps its size.
    pub fn clear(&mut self) {
        self.table_mut().clear();
    }

    /// Entries in slot order. The order is unrelated to insertion order and
    /// changes when the table grows.
    #[track_caller]
    pub fn iter(&self) -> T::Iter<'_> {
        self.table().iter()
    }

    /// Keys in slot order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Values in slot order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Insert every pair from `iter`.
    #[track_caller]
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }

    /// Pool the map rents from.
    #[track_caller]
    pub fn pool(&self) -> &Pool {
        self.table().pool()
    }

    /// Token of the entry buffer currently in use.
    #[track_caller]
    pub fn token(&self) -> BufferToken {
        self.table().token()
    }

    /// Pin the current entry buffer so it survives retirement until the
    /// pin is dropped.
    pub fn pin(&self) -> PoolResult<ViewPin> {
        self.table().pin()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.table.is_none()
    }

    /// Retire the map's buffers to quarantine.
    ///
    /// Returns [`PoolError::DoubleRelease`] if the map was already disposed.
    pub fn dispose(&mut self) -> PoolResult<()> {
        match self.table.take() {
            Some(table) => {
                self.disposed = Some(table.token().id());
                table.retire()
            }
            None => Err(PoolError::DoubleRelease {
                id: self.disposed.unwrap_or(BufferId::new(u32::MAX)),
            }),
        }
    }
}

impl<K, V, T, Q> Index<&Q> for PooledMap<K, V, T>
where
    K: Hash + Eq + Send + 'static + Borrow<Q>,
    V: Send + 'static,
    T: TableStrategy<K, V>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is not present.
    #[track_caller]
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not found in pooled map"),
        }
    }
}

impl<'a, K, V, T> IntoIterator for &'a PooledMap<K, V, T>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    T: TableStrategy<K, V>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = T::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, T> AssociativeContainer<K, V> for PooledMap<K, V, T>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    T: TableStrategy<K, V>,
{
    type Iter<'a>
        = T::Iter<'a>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    fn pool(&self) -> &Pool {
        PooledMap::pool(self)
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        PooledMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<&V> {
        PooledMap::get(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        PooledMap::remove(self, key)
    }

    fn len(&self) -> usize {
        PooledMap::len(self)
    }

    fn iter(&self) -> T::Iter<'_> {
        PooledMap::iter(self)
    }
}

impl<K, V, T> fmt::Debug for PooledMap<K, V, T>
where
    K: Hash + Eq + Send + 'static + fmt::Debug,
    V: Send + 'static + fmt::Debug,
    T: TableStrategy<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => f.debug_map().entries(table.iter()).finish(),
            None => f.write_str("PooledMap(disposed)"),
        }
    }
}
