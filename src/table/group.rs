//! Control-byte groups for the swiss table.
//!
//! Every slot has one control byte:
//!
//! ```text
//! EMPTY    1111_1111
//! DELETED  1000_0000
//! FULL     0hhh_hhhh   (7-bit hash fragment)
//! ```
//!
//! A [`Group`] is 16 consecutive control bytes loaded at once so that a
//! single compare finds every candidate slot in the group.

/// Number of control bytes examined per probe step.
pub const GROUP_WIDTH: usize = 16;

/// Control byte of a slot that has never been used since the last rehash.
pub(crate) const EMPTY: u8 = 0xFF;

/// Control byte of a slot whose entry was removed.
pub(crate) const DELETED: u8 = 0x80;

/// Whether a control byte marks an occupied slot.
#[inline]
pub(crate) fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

/// Probe start, taken from the low bits of the hash.
#[inline]
pub(crate) fn h1(hash: u64) -> usize {
    hash as usize
}

/// 7-bit fragment stored in the control byte, taken from the top bits so it
/// is independent of the probe start.
#[inline]
pub(crate) fn h2(hash: u64) -> u8 {
    (hash >> 57) as u8
}

/// Set of slot offsets within one group, one bit per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitMask(pub(crate) u16);

impl BitMask {
    #[inline]
    pub(crate) fn any_bit_set(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub(crate) fn lowest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    #[inline]
    pub(crate) fn invert(self) -> Self {
        BitMask(!self.0)
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let bit = self.lowest_set_bit()?;
        // clear lowest set bit
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

pub(crate) use imp::Group;

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
mod imp {
    use super::{BitMask, EMPTY, GROUP_WIDTH};
    use std::arch::x86_64::*;

    /// 16 control bytes held in an SSE2 register.
    #[derive(Clone, Copy)]
    pub(crate) struct Group(__m128i);

    impl Group {
        /// Load the group starting at `ctrl[0]`.
        ///
        /// # Panics
        ///
        /// Panics if `ctrl` is shorter than [`GROUP_WIDTH`].
        #[inline]
        pub(crate) fn load(ctrl: &[u8]) -> Self {
            assert!(ctrl.len() >= GROUP_WIDTH);
            // SAFETY: at least 16 readable bytes, and loadu has no alignment
            // requirement
            unsafe { Group(_mm_loadu_si128(ctrl.as_ptr() as *const __m128i)) }
        }

        /// Slots whose control byte equals `byte`.
        #[inline]
        pub(crate) fn match_byte(self, byte: u8) -> BitMask {
            // SAFETY: sse2 is enabled for this target
            unsafe {
                let cmp = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(byte as i8));
                BitMask(_mm_movemask_epi8(cmp) as u16)
            }
        }

        #[inline]
        pub(crate) fn match_empty(self) -> BitMask {
            self.match_byte(EMPTY)
        }

        /// Slots that are EMPTY or DELETED, i.e. have the high bit set.
        #[inline]
        pub(crate) fn match_empty_or_deleted(self) -> BitMask {
            // SAFETY: sse2 is enabled for this target
            unsafe { BitMask(_mm_movemask_epi8(self.0) as u16) }
        }

        #[inline]
        pub(crate) fn match_full(self) -> BitMask {
            self.match_empty_or_deleted().invert()
        }
    }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
mod imp {
    use super::{BitMask, EMPTY, GROUP_WIDTH};

    /// Scalar fallback: the group is a plain byte array.
    #[derive(Clone, Copy)]
    pub(crate) struct Group([u8; GROUP_WIDTH]);

    impl Group {
        /// Load the group starting at `ctrl[0]`.
        ///
        /// # Panics
        ///
        /// Panics if `ctrl` is shorter than [`GROUP_WIDTH`].
        #[inline]
        pub(crate) fn load(ctrl: &[u8]) -> Self {
            let mut bytes = [0; GROUP_WIDTH];
            bytes.copy_from_slice(&ctrl[..GROUP_WIDTH]);
            Group(bytes)
        }

        #[inline]
        fn mask_where(self, f: impl Fn(u8) -> bool) -> BitMask {
            let mut mask = 0u16;
            for (i, &byte) in self.0.iter().enumerate() {
                if f(byte) {
                    mask |= 1 << i;
                }
            }
            BitMask(mask)
        }

        #[inline]
        pub(crate) fn match_byte(self, byte: u8) -> BitMask {
            self.mask_where(|b| b == byte)
        }

        #[inline]
        pub(crate) fn match_empty(self) -> BitMask {
            self.match_byte(EMPTY)
        }

        #[inline]
        pub(crate) fn match_empty_or_deleted(self) -> BitMask {
            self.mask_where(|b| b & 0x80 != 0)
        }

        #[inline]
        pub(crate) fn match_full(self) -> BitMask {
            self.match_empty_or_deleted().invert()
        }
    }
}

/// Triangular probe sequence over groups: offsets 0, 1, 3, 6, 10, ...
///
/// With a power-of-two group count this visits every group exactly once
/// before repeating.
pub(crate) struct ProbeSeq {
    pub(crate) group: usize,
    stride: usize,
    group_mask: usize,
}

impl ProbeSeq {
    #[inline]
    pub(crate) fn new(hash: u64, group_mask: usize) -> Self {
        Self {
            group: h1(hash) & group_mask,
            stride: 0,
            group_mask,
        }
    }

    /// Advance to the next group. Returns `false` once every group has been
    /// visited.
    #[inline]
    pub(crate) fn move_next(&mut self) -> bool {
        if self.stride >= self.group_mask {
            return false;
        }
        self.stride += 1;
        self.group = (self.group + self.stride) & self.group_mask;
        true
    }
}
