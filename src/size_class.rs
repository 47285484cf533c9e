//! Power-of-two size classes for buffer free lists.
//!
//! Class `n` holds buffers with a capacity of exactly `4 << n` elements.
//! Requests are rounded up to the next class; a buffer is only ever reused
//! for a request of its own class or a smaller one.

use crate::error::{PoolError, PoolResult};
use std::fmt;

/// Smallest capacity handed out by the pool (elements).
pub const MIN_CAPACITY: usize = 1 << MIN_SHIFT;

/// Largest capacity handed out by the pool (elements).
pub const MAX_CAPACITY: usize = 1 << MAX_SHIFT;

/// Number of distinct size classes.
pub const NUM_SIZE_CLASSES: usize = (MAX_SHIFT - MIN_SHIFT + 1) as usize;

const MIN_SHIFT: u32 = 2;
const MAX_SHIFT: u32 = 30;

/// A capacity tier used to index free lists.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    /// The smallest size class.
    pub const MIN: Self = Self(0);

    /// The largest size class.
    pub const MAX: Self = Self((NUM_SIZE_CLASSES - 1) as u8);

    /// Smallest class able to hold `capacity` elements.
    pub fn for_capacity(capacity: usize) -> PoolResult<Self> {
        if capacity > MAX_CAPACITY {
            return Err(PoolError::CapacityOverflow {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        let rounded = capacity.max(MIN_CAPACITY).next_power_of_two();
        Ok(Self((rounded.trailing_zeros() - MIN_SHIFT) as u8))
    }

    /// Largest class whose capacity fits inside `capacity` elements.
    ///
    /// Used to re-tag storage whose real capacity is known. Returns `None`
    /// when `capacity` is below the smallest class.
    pub fn floor_of(capacity: usize) -> Option<Self> {
        if capacity < MIN_CAPACITY {
            return None;
        }
        let shift = (usize::BITS - 1 - capacity.leading_zeros()).min(MAX_SHIFT);
        Some(Self((shift - MIN_SHIFT) as u8))
    }

    /// Capacity of buffers in this class, in elements.
    #[inline]
    pub fn capacity(self) -> usize {
        MIN_CAPACITY << self.0
    }

    /// Index of this class, `0..NUM_SIZE_CLASSES`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The next larger class, if any.
    #[inline]
    pub fn next(self) -> Option<Self> {
        if self.0 < Self::MAX.0 {
            Some(Self(self.0 + 1))
        } else {
            None
        }
    }
}

impl fmt::Debug for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SizeClass({})", self.capacity())
    }
}
