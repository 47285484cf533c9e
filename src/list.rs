//! Pooled growable list.
//!
//! A [`PooledList`] owns one lent [`Buffer`]. When a push does not fit it
//! rents a buffer at least twice as large, moves the elements across and
//! retires the old buffer to quarantine.

use crate::buffer::{Buffer, BufferId, BufferToken, ViewPin};
use crate::error::{PoolError, PoolResult, growth_failed, use_after_dispose};
use crate::pool::Pool;
use crate::size_class::MAX_CAPACITY;
use crate::traits::SequenceContainer;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::debug;

const NAME: &str = "pooled list";

/// Growable contiguous sequence backed by pooled storage.
///
/// Derefs to a slice, so all read-only slice methods are available. Growth
/// never reallocates in place.
pub struct PooledList<T: Send + 'static> {
    buffer: Option<Buffer<T>>,
    disposed: Option<BufferId>,
}

impl<T: Send + 'static> PooledList<T> {
    /// Create a list in the global pool with room for `hint` elements.
    pub fn create(hint: usize) -> PoolResult<Self> {
        Self::create_in(&Pool::global(), hint)
    }

    /// Create a list in `pool` with room for `hint` elements.
    pub fn create_in(pool: &Pool, hint: usize) -> PoolResult<Self> {
        Ok(Self {
            buffer: Some(pool.rent(hint)?),
            disposed: None,
        })
    }

    #[inline]
    #[track_caller]
    fn buffer(&self) -> &Buffer<T> {
        match &self.buffer {
            Some(buffer) => buffer,
            None => use_after_dispose(NAME),
        }
    }

    #[inline]
    #[track_caller]
    fn buffer_mut(&mut self) -> &mut Buffer<T> {
        match &mut self.buffer {
            Some(buffer) => buffer,
            None => use_after_dispose(NAME),
        }
    }

    /// Append an element.
    ///
    /// # Panics
    ///
    /// Panics if the list must grow past the largest size class or the
    /// allocation fails.
    #[inline]
    #[track_caller]
    pub fn push(&mut self, value: T) {
        if let Err(e) = self.try_push(value) {
            growth_failed(NAME, e);
        }
    }

    /// Append an element, reporting growth failures.
    #[inline]
    pub fn try_push(&mut self, value: T) -> PoolResult<()> {
        if !self.buffer().has_room(1) {
            self.try_reserve(1)?;
        }
        self.buffer_mut().push_within(value);
        Ok(())
    }

    /// Make room for at least `additional` more elements.
    ///
    /// Growth at least doubles the capacity.
    pub fn try_reserve(&mut self, additional: usize) -> PoolResult<()> {
        let buffer = self.buffer();
        if buffer.has_room(additional) {
            return Ok(());
        }

        let needed = buffer
            .len()
            .checked_add(additional)
            .ok_or(PoolError::CapacityOverflow {
                requested: usize::MAX,
                max: MAX_CAPACITY,
            })?;
        let target = needed.max(buffer.capacity().saturating_mul(2)).min(MAX_CAPACITY.max(needed));

        let mut grown = buffer.pool().rent::<T>(target)?;
        let old = self.buffer_mut();
        grown.vec_mut().append(old.vec_mut());
        debug!(from = old.capacity(), to = grown.capacity(), "pooled list grew");

        let old = std::mem::replace(old, grown);
        old.retire()
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        self.buffer_mut().vec_mut().pop()
    }

    /// Shorten the list to `len` elements.
    pub fn truncate(&mut self, len: usize) {
        self.buffer_mut().vec_mut().truncate(len);
    }

    /// Remove every element. The buffer is kept.
    pub fn clear(&mut self) {
        self.buffer_mut().vec_mut().clear();
    }

    /// Number of elements.
    #[inline]
    #[track_caller]
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    /// Whether the list is empty.
    #[inline]
    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements the current buffer holds before the list grows.
    #[inline]
    #[track_caller]
    pub fn capacity(&self) -> usize {
        self.buffer().capacity()
    }

    /// Element at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.buffer().get(index)
    }

    /// Mutable element at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.buffer_mut().get_mut(index)
    }

    /// Live elements.
    #[inline]
    #[track_caller]
    pub fn as_slice(&self) -> &[T] {
        self.buffer()
    }

    /// Live elements, mutably.
    #[inline]
    #[track_caller]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.buffer_mut()
    }

    /// Iterate over the elements. Each call starts from the beginning.
    #[inline]
    #[track_caller]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Sort in place without allocating.
    ///
    /// This is an unstable sort: equal elements may be reordered. Unlike
    /// `slice::sort`, it never allocates scratch space outside the pool.
    pub fn sort(&mut self)
    where
        T: Ord,
    {
        self.as_mut_slice().sort_unstable();
    }

    /// Sort in place with a comparator, see [`sort`](Self::sort).
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.as_mut_slice().sort_unstable_by(compare);
    }

    /// Sort in place by a key, see [`sort`](Self::sort).
    pub fn sort_by_key<K, F>(&mut self, f: F)
    where
        F: FnMut(&T) -> K,
        K: Ord,
    {
        self.as_mut_slice().sort_unstable_by_key(f);
    }

    /// Append every element of `iter`.
    ///
    /// # Panics
    ///
    /// Panics if the list cannot grow, like [`push`](Self::push).
    #[track_caller]
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        if let Err(e) = self.try_reserve(iter.size_hint().0) {
            growth_failed(NAME, e);
        }
        for value in iter {
            self.push(value);
        }
    }

    /// Append clones of every element of `other`.
    #[track_caller]
    pub fn extend_from_slice(&mut self, other: &[T])
    where
        T: Clone,
    {
        self.extend(other.iter().cloned());
    }

    /// Copy the elements into an unpooled `Vec`.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    /// Pool the list rents from.
    #[track_caller]
    pub fn pool(&self) -> &Pool {
        self.buffer().pool()
    }

    /// Token of the buffer currently in use.
    #[track_caller]
    pub fn token(&self) -> BufferToken {
        self.buffer().token()
    }

    /// Address of the current storage.
    #[track_caller]
    pub fn as_ptr(&self) -> *const T {
        self.buffer().as_ptr()
    }

    /// Pin the current buffer, for a view that outlives this borrow of the
    /// list. See [`Buffer::pin`].
    pub fn pin(&self) -> PoolResult<ViewPin> {
        self.buffer().pin()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Retire the buffer to quarantine.
    ///
    /// Returns [`PoolError::DoubleRelease`] if the list was already disposed.
    pub fn dispose(&mut self) -> PoolResult<()> {
        match self.buffer.take() {
            Some(buffer) => {
                self.disposed = Some(buffer.id());
                buffer.retire()
            }
            None => Err(PoolError::DoubleRelease {
                id: self.disposed.unwrap_or(BufferId::new(u32::MAX)),
            }),
        }
    }
}

impl<T: Send + 'static> Deref for PooledList<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Send + 'static> DerefMut for PooledList<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'a, T: Send + 'static> IntoIterator for &'a PooledList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Send + 'static> SequenceContainer<T> for PooledList<T> {
    fn pool(&self) -> &Pool {
        PooledList::pool(self)
    }

    fn as_slice(&self) -> &[T] {
        PooledList::as_slice(self)
    }
}

impl<T: Send + 'static + PartialEq> PartialEq<[T]> for PooledList<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: Send + 'static + PartialEq, const N: usize> PartialEq<[T; N]> for PooledList<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        self.as_slice() == other
    }
}

impl<T: Send + 'static + fmt::Debug> fmt::Debug for PooledList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buffer {
            Some(buffer) => f.debug_list().entries(buffer.iter()).finish(),
            None => f.write_str("PooledList(disposed)"),
        }
    }
}
