//! Open-addressing hash tables over pooled buffers.
//!
//! Two strategies share one contract, [`TableStrategy`]:
//!
//! - [`ClassicTable`] - one slot array, perturbed probing, tombstones
//! - [`SwissTable`] - slot array plus a parallel control-byte array probed
//!   16 slots at a time
//!
//! Tables store entries only; hashing is done by the owning
//! [`PooledMap`](crate::PooledMap), which passes the hash of every key in.
//! Growth rents a larger buffer, moves the live entries and retires the old
//! buffer.

mod classic;
mod group;
mod swiss;

pub use classic::{ClassicIter, ClassicTable};
pub use group::GROUP_WIDTH;
pub use swiss::{SwissIter, SwissTable};

use crate::buffer::{BufferToken, ViewPin};
use crate::error::PoolResult;
use crate::pool::Pool;
use ahash::RandomState;
use std::borrow::Borrow;
use std::hash::Hash;

/// Storage and probing strategy behind a pooled map or set.
pub trait TableStrategy<K, V>: Sized + Send
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    /// Iterator over live entries in slot order.
    type Iter<'a>: Iterator<Item = (&'a K, &'a V)>
    where
        Self: 'a,
        K: 'a,
        V: 'a;

    /// Rent storage for at least `hint` entries before the first resize.
    fn with_capacity_in(pool: &Pool, hint: usize) -> PoolResult<Self>;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Entries the table holds before it must resize.
    fn capacity(&self) -> usize;

    /// Number of slots.
    fn slots(&self) -> usize;

    /// Pool the table rents from.
    fn pool(&self) -> &Pool;

    /// Token of the entry buffer.
    fn token(&self) -> BufferToken;

    /// Pin the entry buffer, see [`Buffer::pin`](crate::Buffer::pin).
    fn pin(&self) -> PoolResult<ViewPin> {
        self.pool().pin(self.token())
    }

    /// Find the entry for `key`.
    fn find<Q>(&self, hash: u64, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized;

    /// Find the value for `key`, mutably.
    fn find_mut<Q>(&mut self, hash: u64, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized;

    /// Insert or overwrite. Returns the previous value.
    ///
    /// `hasher` rehashes the live keys if the table has to grow.
    fn insert(&mut self, hasher: &RandomState, hash: u64, key: K, value: V)
    -> PoolResult<Option<V>>;

    /// Remove the entry for `key`.
    fn remove<Q>(&mut self, hash: u64, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized;

    /// Remove every entry, keeping the storage.
    fn clear(&mut self);

    /// Iterate over live entries in slot order.
    fn iter(&self) -> Self::Iter<'_>;

    /// Retire the table's buffers to quarantine.
    fn retire(self) -> PoolResult<()>;
}

/// Hash builder for a new table.
pub(crate) fn hash_builder() -> RandomState {
    // Use fixed seeds in tests for deterministic behavior
    #[cfg(test)]
    let hash_builder = RandomState::with_seeds(
        0xbb8c484891ec6c86,
        0x0522a25ae9c769f9,
        0xeed2797b9571bc75,
        0x4feb29c1fbbd59d0,
    );
    #[cfg(not(test))]
    let hash_builder = RandomState::new();

    hash_builder
}
