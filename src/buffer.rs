//! Lent buffers, descriptor tokens and view pins.
//!
//! A [`Buffer`] is the descriptor a container owns while it is lent: the
//! storage, its id, size class and generation. It is a guard; dropping it
//! retires the storage to the pool's quarantine, so the release runs exactly
//! once on every exit path.
//!
//! The storage is a `Vec<T>` whose capacity is fixed for the lifetime of the
//! lease. Containers never let it reallocate in place; growth rents a larger
//! buffer and retires the old one.

use crate::error::PoolResult;
use crate::pool::Pool;
use crate::size_class::SizeClass;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Identifier of a descriptor inside one pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

impl BufferId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw index of this descriptor.
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A descriptor as seen at one point in time.
///
/// Tokens are plain values and may outlive the buffer they describe.
/// [`Pool::validate`] tells whether the descriptor has been recycled since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferToken {
    id: BufferId,
    generation: u64,
}

impl BufferToken {
    pub(crate) fn new(id: BufferId, generation: u64) -> Self {
        Self { id, generation }
    }

    /// Descriptor id.
    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Generation at the time the token was taken.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Backing storage lent to one container.
pub struct Buffer<T: Send + 'static> {
    data: Vec<T>,
    token: BufferToken,
    class: SizeClass,
    pool: Pool,
    released: bool,
}

impl<T: Send + 'static> Buffer<T> {
    pub(crate) fn from_parts(data: Vec<T>, token: BufferToken, class: SizeClass, pool: Pool) -> Self {
        debug_assert!(data.is_empty());
        debug_assert!(data.capacity() >= class.capacity());
        Self {
            data,
            token,
            class,
            pool,
            released: false,
        }
    }

    /// Descriptor id.
    #[inline]
    pub fn id(&self) -> BufferId {
        self.token.id
    }

    /// Generation this buffer was lent at.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.token.generation
    }

    /// Token describing this lease.
    #[inline]
    pub fn token(&self) -> BufferToken {
        self.token
    }

    /// Size class the buffer was rented from.
    #[inline]
    pub fn class(&self) -> SizeClass {
        self.class
    }

    /// Usable capacity in elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.class.capacity()
    }

    /// Whether another `additional` elements fit without growing.
    #[inline]
    pub fn has_room(&self, additional: usize) -> bool {
        self.capacity() - self.data.len() >= additional
    }

    /// Address of the storage. Two leases of the same physical buffer
    /// report the same address.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// The pool this buffer belongs to.
    #[inline]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Mutable access to the storage vector.
    ///
    /// Callers must keep `len() <= capacity()`; the vector must never
    /// reallocate while lent.
    #[inline]
    pub(crate) fn vec_mut(&mut self) -> &mut Vec<T> {
        &mut self.data
    }

    /// Append an element. The caller has checked [`has_room`](Self::has_room).
    #[inline]
    pub(crate) fn push_within(&mut self, value: T) {
        debug_assert!(self.has_room(1), "push past buffer capacity");
        self.data.push(value);
    }

    /// Register an outstanding view on this buffer.
    ///
    /// While the returned pin is alive the buffer is never recycled, even
    /// after it is retired and the pool is maintained.
    pub fn pin(&self) -> PoolResult<ViewPin> {
        self.pool.pin(self.token)
    }

    /// Retire the buffer to quarantine. Equivalent to dropping it, but
    /// reports misuse instead of logging it.
    pub fn retire(mut self) -> PoolResult<()> {
        self.released = true;
        let data = std::mem::take(&mut self.data);
        self.pool.retire_storage(self.token, self.class, data)
    }

    /// Return the buffer straight to the free lists, bypassing quarantine.
    ///
    /// A buffer with outstanding pins is quarantined instead.
    pub fn release(mut self) -> PoolResult<()> {
        self.released = true;
        let data = std::mem::take(&mut self.data);
        self.pool.release_storage(self.token, self.class, data)
    }
}

impl<T: Send + 'static> Deref for Buffer<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Send + 'static> DerefMut for Buffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Send + 'static> Drop for Buffer<T> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let data = std::mem::take(&mut self.data);
        if let Err(e) = self.pool.retire_storage(self.token, self.class, data) {
            tracing::warn!(buffer = %self.token.id, error = %e, "dropped buffer could not be retired");
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.token.id)
            .field("generation", &self.token.generation)
            .field("class", &self.class)
            .field("len", &self.data.len())
            .finish()
    }
}

/// An outstanding view on a buffer, such as an enumerator or a slice kept
/// outside the owning container.
///
/// Pins hold retired buffers in quarantine: [`Pool::maintain`] skips any
/// descriptor with live pins, so its storage cannot be handed to a new
/// container while the view exists.
pub struct ViewPin {
    pool: Pool,
    token: BufferToken,
}

impl ViewPin {
    pub(crate) fn new(pool: Pool, token: BufferToken) -> Self {
        Self { pool, token }
    }

    /// Token of the pinned descriptor.
    #[inline]
    pub fn token(&self) -> BufferToken {
        self.token
    }

    /// Check the pinned generation against the live descriptor.
    pub fn check(&self) -> PoolResult<()> {
        self.pool.validate(self.token)
    }
}

impl Drop for ViewPin {
    fn drop(&mut self) {
        self.pool.unpin(self.token);
    }
}

impl fmt::Debug for ViewPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewPin").field("token", &self.token).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Policy;
    use crate::error::PoolError;

    #[test]
    fn test_buffer_accessors() {
        let pool = Pool::new(Policy::default());
        let mut buffer = pool.rent::<u32>(10).unwrap();
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.generation(), 0);
        assert!(buffer.is_empty());
        assert!(buffer.has_room(16));
        assert!(!buffer.has_room(17));

        buffer.push_within(7);
        assert_eq!(&buffer[..], &[7]);
        assert!(buffer.has_room(15));
    }

    #[test]
    fn test_drop_retires() {
        let pool = Pool::new(Policy::default());
        let buffer = pool.rent::<u64>(4).unwrap();
        let token = buffer.token();
        drop(buffer);
        assert_eq!(pool.quarantined(), 1);

        pool.maintain();
        assert_eq!(pool.quarantined(), 0);
        assert!(matches!(
            pool.validate(token),
            Err(PoolError::StaleGeneration { .. })
        ));
    }

    #[test]
    fn test_pin_reports_stale_after_recycle() {
        let pool = Pool::new(Policy::default());
        let buffer = pool.rent::<u8>(4).unwrap();
        let pin = buffer.pin().unwrap();
        assert!(pin.check().is_ok());

        buffer.retire().unwrap();
        pool.maintain();
        // still pinned, so not recycled
        assert!(pin.check().is_ok());
        assert_eq!(pool.quarantined(), 1);

        let token = pin.token();
        drop(pin);
        pool.maintain();
        assert!(pool.validate(token).is_err());
    }

    #[test]
    fn test_display_id() {
        assert_eq!(BufferId::new(12).to_string(), "#12");
        assert_eq!(format!("{:?}", BufferId::new(12)), "BufferId(12)");
    }
}
