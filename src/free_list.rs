//! Per-size-class stacks of idle buffers for one element type.

use crate::buffer::BufferId;
use crate::config::Policy;
use crate::size_class::{NUM_SIZE_CLASSES, SizeClass};

/// How many classes above the requested one a rent may take a buffer from.
pub const UPSIZE_SEARCH: usize = 2;

/// Storage that is not lent to anyone, plus the descriptor it belongs to.
pub(crate) struct Idle<T> {
    pub(crate) data: Vec<T>,
    pub(crate) id: BufferId,
    pub(crate) class: SizeClass,
}

/// Bounded free lists, one stack per size class.
pub(crate) struct FreeLists<T> {
    classes: Vec<Vec<Idle<T>>>,
    retained_buffers: usize,
    retained_elements: usize,
}

impl<T> FreeLists<T> {
    pub(crate) fn new() -> Self {
        Self {
            classes: (0..NUM_SIZE_CLASSES).map(|_| Vec::new()).collect(),
            retained_buffers: 0,
            retained_elements: 0,
        }
    }

    /// Take an idle buffer of `class` or up to [`UPSIZE_SEARCH`] classes larger.
    pub(crate) fn pop(&mut self, class: SizeClass) -> Option<Idle<T>> {
        let first = class.index();
        let last = (first + UPSIZE_SEARCH).min(NUM_SIZE_CLASSES - 1);
        for index in first..=last {
            if let Some(idle) = self.classes[index].pop() {
                self.retained_buffers -= 1;
                self.retained_elements -= idle.class.capacity();
                return Some(idle);
            }
        }
        None
    }

    /// Push an idle buffer if the policy allows it, handing it back otherwise.
    pub(crate) fn try_push(&mut self, idle: Idle<T>, policy: &Policy) -> Result<(), Idle<T>> {
        debug_assert!(idle.data.is_empty());
        let capacity = idle.class.capacity();
        if !policy.may_retain(capacity) {
            return Err(idle);
        }

        let stack = &mut self.classes[idle.class.index()];
        let class_elements = (stack.len() + 1) * capacity;
        if stack.len() >= policy.per_class_limit || class_elements > policy.max_retained_length {
            return Err(idle);
        }

        self.retained_buffers += 1;
        self.retained_elements += capacity;
        stack.push(idle);
        Ok(())
    }

    /// Remove every idle buffer.
    pub(crate) fn drain(&mut self) -> Vec<Idle<T>> {
        self.retained_buffers = 0;
        self.retained_elements = 0;
        self.classes.iter_mut().flat_map(|stack| stack.drain(..)).collect()
    }

    pub(crate) fn retained_buffers(&self) -> usize {
        self.retained_buffers
    }

    pub(crate) fn retained_elements(&self) -> usize {
        self.retained_elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(raw: u32, capacity: usize) -> Idle<u32> {
        let class = SizeClass::for_capacity(capacity).unwrap();
        Idle {
            data: Vec::with_capacity(class.capacity()),
            id: BufferId::new(raw),
            class,
        }
    }

    #[test]
    fn test_pop_exact_class() {
        let mut lists = FreeLists::new();
        let policy = Policy::default();
        assert!(lists.try_push(idle(1, 16), &policy).is_ok());
        assert_eq!(lists.retained_buffers(), 1);
        assert_eq!(lists.retained_elements(), 16);

        let popped = lists.pop(SizeClass::for_capacity(16).unwrap()).unwrap();
        assert_eq!(popped.id, BufferId::new(1));
        assert_eq!(lists.retained_buffers(), 0);
        assert_eq!(lists.retained_elements(), 0);
    }

    #[test]
    fn test_pop_larger_class() {
        let mut lists = FreeLists::new();
        let policy = Policy::default();
        assert!(lists.try_push(idle(1, 64), &policy).is_ok());

        // 64 is two classes above 16
        let popped = lists.pop(SizeClass::for_capacity(16).unwrap()).unwrap();
        assert_eq!(popped.class.capacity(), 64);
    }

    #[test]
    fn test_never_downsizes() {
        let mut lists = FreeLists::new();
        let policy = Policy::default();
        assert!(lists.try_push(idle(1, 8), &policy).is_ok());
        assert!(lists.pop(SizeClass::for_capacity(16).unwrap()).is_none());
    }

    #[test]
    fn test_too_far_above_is_not_used() {
        let mut lists = FreeLists::new();
        let policy = Policy::default();
        assert!(lists.try_push(idle(1, 128), &policy).is_ok());
        assert!(lists.pop(SizeClass::for_capacity(16).unwrap()).is_none());
    }

    #[test]
    fn test_policy_caps() {
        let mut lists = FreeLists::new();
        let policy = Policy::new()
            .with_max_retained_length(64)
            .with_per_class_limit(3);

        // above the length cap
        assert!(lists.try_push(idle(1, 128), &policy).is_err());

        // 64-element class holds one buffer before exceeding the cap
        assert!(lists.try_push(idle(2, 64), &policy).is_ok());
        assert!(lists.try_push(idle(3, 64), &policy).is_err());

        // 4-element class is bounded by the count cap
        for raw in 10..13 {
            assert!(lists.try_push(idle(raw, 4), &policy).is_ok());
        }
        assert!(lists.try_push(idle(13, 4), &policy).is_err());
        assert_eq!(lists.retained_buffers(), 4);
        assert_eq!(lists.retained_elements(), 64 + 12);
    }

    #[test]
    fn test_retention_disabled() {
        let mut lists = FreeLists::new();
        let policy = Policy::new().with_retain_on_release(false);
        assert!(lists.try_push(idle(1, 4), &policy).is_err());
    }

    #[test]
    fn test_drain() {
        let mut lists = FreeLists::new();
        let policy = Policy::default();
        assert!(lists.try_push(idle(1, 4), &policy).is_ok());
        assert!(lists.try_push(idle(2, 32), &policy).is_ok());
        assert_eq!(lists.drain().len(), 2);
        assert_eq!(lists.retained_buffers(), 0);
        assert_eq!(lists.retained_elements(), 0);
    }
}
