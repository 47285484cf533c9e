//! Fused lazy queries.
//!
//! A [`Query`] pairs a source iterator with a chain of stages built by
//! [`filter`](Query::filter), [`map`](Query::map) and [`take`](Query::take).
//! The chain is a nested generic type, so the whole pipeline is
//! monomorphized into one loop. Nothing runs until a terminal method is
//! called; [`to_pooled_list`](Query::to_pooled_list) then rents exactly one
//! destination buffer and makes a single pass over the source, stopping as
//! soon as a `take` bound is reached.
//!
//! ```
//! use pooled_collections::{Pool, PooledList, SequenceContainer};
//!
//! let pool = Pool::default();
//! let mut source = PooledList::create_in(&pool, 20).unwrap();
//! source.extend(1..=20);
//!
//! let result = source
//!     .query()
//!     .filter(|x| **x > 10)
//!     .map(|x| x * 2)
//!     .take(3)
//!     .to_pooled_list(3)
//!     .unwrap();
//! assert_eq!(result, [22, 24, 26]);
//! ```

use crate::error::PoolResult;
use crate::list::PooledList;
use crate::pool::Pool;
use std::convert::Infallible;

/// Destination capacity used by [`Query::collect_pooled`].
pub const DEFAULT_QUERY_CAPACITY: usize = 16;

/// What a stage decided for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow<T> {
    /// Pass the element on and keep pulling.
    Yield(T),
    /// Drop the element and keep pulling.
    Skip,
    /// Pass the element on, then stop.
    YieldLast(T),
    /// Stop without passing anything on.
    Stop,
}

/// One step of a query pipeline.
pub trait Stage<In> {
    /// Element type produced by this stage.
    type Out;

    /// Run one element through this stage and everything before it.
    fn process(&mut self, item: In) -> Flow<Self::Out>;

    /// Whether the stage can produce nothing more, so the source need not
    /// be pulled at all.
    fn saturated(&self) -> bool {
        false
    }
}

/// The empty pipeline: every element passes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<In> Stage<In> for Identity {
    type Out = In;

    #[inline]
    fn process(&mut self, item: In) -> Flow<In> {
        Flow::Yield(item)
    }
}

/// Keep elements matching a predicate.
pub struct Where<S, P> {
    inner: S,
    predicate: P,
}

impl<In, S, P> Stage<In> for Where<S, P>
where
    S: Stage<In>,
    P: FnMut(&S::Out) -> bool,
{
    type Out = S::Out;

    #[inline]
    fn process(&mut self, item: In) -> Flow<S::Out> {
        match self.inner.process(item) {
            Flow::Yield(x) if (self.predicate)(&x) => Flow::Yield(x),
            Flow::Yield(_) | Flow::Skip => Flow::Skip,
            Flow::YieldLast(x) if (self.predicate)(&x) => Flow::YieldLast(x),
            Flow::YieldLast(_) | Flow::Stop => Flow::Stop,
        }
    }

    #[inline]
    fn saturated(&self) -> bool {
        self.inner.saturated()
    }
}

/// Project every element.
pub struct Select<S, F> {
    inner: S,
    projector: F,
}

impl<In, S, F, O> Stage<In> for Select<S, F>
where
    S: Stage<In>,
    F: FnMut(S::Out) -> O,
{
    type Out = O;

    #[inline]
    fn process(&mut self, item: In) -> Flow<O> {
        match self.inner.process(item) {
            Flow::Yield(x) => Flow::Yield((self.projector)(x)),
            Flow::YieldLast(x) => Flow::YieldLast((self.projector)(x)),
            Flow::Skip => Flow::Skip,
            Flow::Stop => Flow::Stop,
        }
    }

    #[inline]
    fn saturated(&self) -> bool {
        self.inner.saturated()
    }
}

/// Pass at most `remaining` elements.
pub struct Take<S> {
    inner: S,
    remaining: usize,
}

impl<In, S> Stage<In> for Take<S>
where
    S: Stage<In>,
{
    type Out = S::Out;

    #[inline]
    fn process(&mut self, item: In) -> Flow<S::Out> {
        if self.remaining == 0 {
            return Flow::Stop;
        }
        match self.inner.process(item) {
            Flow::Yield(x) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    Flow::YieldLast(x)
                } else {
                    Flow::Yield(x)
                }
            }
            Flow::YieldLast(x) => {
                self.remaining -= 1;
                Flow::YieldLast(x)
            }
            Flow::Skip => Flow::Skip,
            Flow::Stop => Flow::Stop,
        }
    }

    #[inline]
    fn saturated(&self) -> bool {
        self.remaining == 0 || self.inner.saturated()
    }
}

/// A lazy pipeline over `source`, inert until a terminal call.
pub struct Query<I, S> {
    pool: Pool,
    source: I,
    stage: S,
}

impl<I: Iterator> Query<I, Identity> {
    pub(crate) fn new(pool: Pool, source: I) -> Self {
        Self {
            pool,
            source,
            stage: Identity,
        }
    }

    /// Query an arbitrary iterator, materializing into `pool`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_iter<T: IntoIterator<IntoIter = I>>(pool: &Pool, source: T) -> Self {
        Self::new(pool.clone(), source.into_iter())
    }
}

impl<I, S> Query<I, S>
where
    I: Iterator,
    S: Stage<I::Item>,
{
    /// Keep elements for which `predicate` returns true.
    pub fn filter<P>(self, predicate: P) -> Query<I, Where<S, P>>
    where
        P: FnMut(&S::Out) -> bool,
    {
        Query {
            pool: self.pool,
            source: self.source,
            stage: Where {
                inner: self.stage,
                predicate,
            },
        }
    }

    /// Transform every element with `projector`.
    pub fn map<F, O>(self, projector: F) -> Query<I, Select<S, F>>
    where
        F: FnMut(S::Out) -> O,
    {
        Query {
            pool: self.pool,
            source: self.source,
            stage: Select {
                inner: self.stage,
                projector,
            },
        }
    }

    /// Stop after `n` elements have passed every earlier stage.
    pub fn take(self, n: usize) -> Query<I, Take<S>> {
        Query {
            pool: self.pool,
            source: self.source,
            stage: Take {
                inner: self.stage,
                remaining: n,
            },
        }
    }

    /// Pool the terminal methods rent from.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Single pass over the source, feeding accepted elements to `sink`.
    fn drive<E, F>(self, mut sink: F) -> Result<(), E>
    where
        F: FnMut(S::Out) -> Result<(), E>,
    {
        let Query {
            source, mut stage, ..
        } = self;
        if stage.saturated() {
            return Ok(());
        }
        for item in source {
            match stage.process(item) {
                Flow::Yield(x) => sink(x)?,
                Flow::Skip => {}
                Flow::YieldLast(x) => {
                    sink(x)?;
                    break;
                }
                Flow::Stop => break,
            }
        }
        Ok(())
    }

    /// Run the pipeline into a new pooled list with room for `hint`
    /// elements. A hint that is too small lets the list grow; one that is
    /// too large only wastes capacity.
    pub fn to_pooled_list(self, hint: usize) -> PoolResult<PooledList<S::Out>>
    where
        S::Out: Send + 'static,
    {
        let mut list = PooledList::create_in(&self.pool, hint)?;
        self.drive(|x| list.try_push(x))?;
        Ok(list)
    }

    /// [`to_pooled_list`](Self::to_pooled_list) with the default hint.
    pub fn collect_pooled(self) -> PoolResult<PooledList<S::Out>>
    where
        S::Out: Send + 'static,
    {
        self.to_pooled_list(DEFAULT_QUERY_CAPACITY)
    }

    /// Number of elements the pipeline produces.
    pub fn count(self) -> usize {
        let mut count = 0;
        let _ = self.drive(|_| {
            count += 1;
            Ok::<(), Infallible>(())
        });
        count
    }

    /// Run `f` on every element the pipeline produces.
    pub fn for_each<F: FnMut(S::Out)>(self, mut f: F) {
        let _ = self.drive(|x| {
            f(x);
            Ok::<(), Infallible>(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fused_scenario() {
        let pool = Pool::default();
        let result = Query::from_iter(&pool, 1..=20)
            .filter(|x| *x > 10)
            .map(|x| x * 2)
            .take(3)
            .to_pooled_list(3)
            .unwrap();
        assert_eq!(result, [22, 24, 26]);
        assert_eq!(result.capacity(), 4);
    }

    #[test]
    fn test_take_stops_pulling() {
        let pool = Pool::default();
        let pulled = Cell::new(0);
        let source = (0..100).inspect(|_| pulled.set(pulled.get() + 1));
        let result = Query::from_iter(&pool, source).take(5).collect_pooled().unwrap();
        assert_eq!(result, [0, 1, 2, 3, 4]);
        assert_eq!(pulled.get(), 5);
    }

    #[test]
    fn test_take_zero_never_pulls() {
        let pool = Pool::default();
        let pulled = Cell::new(0);
        let source = (0..10).inspect(|_| pulled.set(pulled.get() + 1));
        let result = Query::from_iter(&pool, source).map(|x| x + 1).take(0).count();
        assert_eq!(result, 0);
        assert_eq!(pulled.get(), 0);
    }

    #[test]
    fn test_take_before_filter() {
        let pool = Pool::default();
        // take 4 from the source, then keep the odd ones
        let result = Query::from_iter(&pool, 0..10)
            .take(4)
            .filter(|x| x % 2 == 1)
            .collect_pooled()
            .unwrap();
        assert_eq!(result, [1, 3]);
    }

    #[test]
    fn test_small_hint_grows() {
        let pool = Pool::default();
        let result = Query::from_iter(&pool, 0..100u32).to_pooled_list(1).unwrap();
        assert_eq!(result.len(), 100);
        assert!(result.capacity() >= 100);
    }

    #[test]
    fn test_hint_overflow() {
        let pool = Pool::default();
        let result = Query::from_iter(&pool, 0..1).to_pooled_list(usize::MAX);
        assert!(result.is_err());
    }

    #[test]
    fn test_for_each_and_count() {
        let pool = Pool::default();
        let mut seen = Vec::new();
        Query::from_iter(&pool, ["a", "bb", "ccc"])
            .map(str::len)
            .for_each(|n| seen.push(n));
        assert_eq!(seen, vec![1, 2, 3]);

        let count = Query::from_iter(&pool, 0..50).filter(|x| x % 5 == 0).count();
        assert_eq!(count, 10);
    }
}
