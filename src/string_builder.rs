//! Pooled string builder.
//!
//! Text is accumulated in a pooled `u8` buffer. [`materialize`] copies it
//! into an owned `String`; the pooled bytes themselves are never handed out,
//! so the buffer can go back to the pool as soon as the builder is done.
//!
//! [`materialize`]: PooledStringBuilder::materialize

use crate::buffer::{Buffer, BufferId, BufferToken, ViewPin};
use crate::error::{PoolError, PoolResult, growth_failed, use_after_dispose};
use crate::pool::Pool;
use crate::size_class::MAX_CAPACITY;
use std::fmt::{self, Write as _};
use tracing::debug;

const NAME: &str = "pooled string builder";

/// Growable UTF-8 text buffer backed by pooled storage.
pub struct PooledStringBuilder {
    buffer: Option<Buffer<u8>>,
    disposed: Option<BufferId>,
}

impl PooledStringBuilder {
    /// Create a builder in the global pool with room for `hint` bytes.
    pub fn create(hint: usize) -> PoolResult<Self> {
        Self::create_in(&Pool::global(), hint)
    }

    /// Create a builder in `pool` with room for `hint` bytes.
    pub fn create_in(pool: &Pool, hint: usize) -> PoolResult<Self> {
        Ok(Self {
            buffer: Some(pool.rent(hint)?),
            disposed: None,
        })
    }

    #[inline]
    #[track_caller]
    fn buffer(&self) -> &Buffer<u8> {
        match &self.buffer {
            Some(buffer) => buffer,
            None => use_after_dispose(NAME),
        }
    }

    #[inline]
    #[track_caller]
    fn buffer_mut(&mut self) -> &mut Buffer<u8> {
        match &mut self.buffer {
            Some(buffer) => buffer,
            None => use_after_dispose(NAME),
        }
    }

    fn reserve(&mut self, additional: usize) -> PoolResult<()> {
        let buffer = self.buffer();
        if buffer.has_room(additional) {
            return Ok(());
        }
        let needed = buffer
            .len()
            .checked_add(additional)
            .filter(|&n| n <= MAX_CAPACITY)
            .ok_or(PoolError::CapacityOverflow {
                requested: buffer.len().saturating_add(additional),
                max: MAX_CAPACITY,
            })?;
        let target = needed.max(buffer.capacity().saturating_mul(2).min(MAX_CAPACITY));

        let mut grown = buffer.pool().rent::<u8>(target)?;
        let old = self.buffer_mut();
        grown.vec_mut().extend_from_slice(old);
        debug!(from = old.capacity(), to = grown.capacity(), "string builder grew");

        let old = std::mem::replace(old, grown);
        old.retire()
    }

    /// Append text, reporting growth failures.
    pub fn try_append(&mut self, text: &str) -> PoolResult<()> {
        self.reserve(text.len())?;
        self.buffer_mut()
            .vec_mut()
            .extend_from_slice(text.as_bytes());
        Ok(())
    }

    /// Append text.
    ///
    /// # Panics
    ///
    /// Panics if the builder cannot grow, see [`try_append`](Self::try_append).
    #[track_caller]
    pub fn append(&mut self, text: &str) -> &mut Self {
        if let Err(e) = self.try_append(text) {
            growth_failed(NAME, e);
        }
        self
    }

    /// Append one character.
    #[track_caller]
    pub fn append_char(&mut self, c: char) -> &mut Self {
        let mut utf8 = [0; 4];
        self.append(c.encode_utf8(&mut utf8))
    }

    /// Append the decimal form of an integer without going through `fmt`.
    #[track_caller]
    pub fn append_int<I: itoa::Integer>(&mut self, value: I) -> &mut Self {
        let mut digits = itoa::Buffer::new();
        self.append(digits.format(value))
    }

    /// Append anything that implements `Display`.
    #[track_caller]
    pub fn append_display<D: fmt::Display + ?Sized>(&mut self, value: &D) -> &mut Self {
        if write!(self, "{value}").is_err() {
            panic!("{NAME}: formatting failed");
        }
        self
    }

    /// The text accumulated so far.
    #[track_caller]
    pub fn as_str(&self) -> &str {
        // SAFETY: bytes only ever enter the buffer from `&str` slices, and
        // `truncate` only cuts at char boundaries
        unsafe { std::str::from_utf8_unchecked(self.buffer()) }
    }

    /// Length in bytes.
    #[track_caller]
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    /// Whether nothing has been appended.
    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes the current buffer holds before the builder grows.
    #[track_caller]
    pub fn capacity(&self) -> usize {
        self.buffer().capacity()
    }

    /// Shorten the text to `len` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` does not lie on a char boundary.
    #[track_caller]
    pub fn truncate(&mut self, len: usize) {
        assert!(
            self.as_str().is_char_boundary(len),
            "truncate at {len} is not a char boundary"
        );
        self.buffer_mut().vec_mut().truncate(len);
    }

    /// Remove all text. The buffer is kept.
    pub fn clear(&mut self) {
        self.buffer_mut().vec_mut().clear();
    }

    /// Copy the text into a new `String`.
    #[track_caller]
    pub fn materialize(&self) -> String {
        self.as_str().to_owned()
    }

    /// Pool the builder rents from.
    #[track_caller]
    pub fn pool(&self) -> &Pool {
        self.buffer().pool()
    }

    /// Token of the buffer currently in use.
    #[track_caller]
    pub fn token(&self) -> BufferToken {
        self.buffer().token()
    }

    /// Pin the current buffer, see [`Buffer::pin`].
    pub fn pin(&self) -> PoolResult<ViewPin> {
        self.buffer().pin()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Retire the buffer to quarantine.
    ///
    /// Returns [`PoolError::DoubleRelease`] if the builder was already
    /// disposed.
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

impl fmt::Write for PooledStringBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.try_append(s).map_err(|_| fmt::Error)
    }
}

impl fmt::Display for PooledStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PooledStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buffer {
            Some(_) => fmt::Debug::fmt(self.as_str(), f),
            None => f.write_str("PooledStringBuilder(disposed)"),
        }
    }
}

impl Pool {
    /// Build a string with a builder rented for the duration of `f`.
    ///
    /// The builder is returned to the pool before this returns, on every
    /// path.
    ///
    /// ```
    /// use pooled_collections::Pool;
    ///
    /// let pool = Pool::default();
    /// let s = pool
    ///     .build_string(16, |sb| {
    ///         sb.append("id=").append_int(42);
    ///     })
    ///     .unwrap();
    /// assert_eq!(s, "id=42");
    /// ```
    pub fn build_string<F>(&self, hint: usize, f: F) -> PoolResult<String>
    where
        F: FnOnce(&mut PooledStringBuilder),
    {
        let mut builder = PooledStringBuilder::create_in(self, hint)?;
        f(&mut builder);
        let text = builder.materialize();
        builder.dispose()?;
        Ok(text)
    }
}
