//! Deferred release of retired buffers.
//!
//! A retired buffer cannot go straight back onto a free list: a view taken
//! before retirement may still refer to it. Retired storage waits here until
//! [`Pool::maintain`](crate::Pool::maintain) confirms there are no pins left
//! on the descriptor.

use crate::free_list::Idle;
use crate::registry::Registry;

/// Retired buffers of one element type awaiting maintenance.
pub(crate) struct Quarantine<T> {
    entries: Vec<Idle<T>>,
}

impl<T> Quarantine<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, idle: Idle<T>) {
        debug_assert!(idle.data.is_empty());
        self.entries.push(idle);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Hand every unpinned entry to `settle`. Pinned entries stay.
    ///
    /// Returns the number of entries left in quarantine.
    pub(crate) fn sweep<F>(&mut self, registry: &mut Registry, mut settle: F) -> usize
    where
        F: FnMut(&mut Registry, Idle<T>),
    {
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            if registry.pins(entry.id) > 0 {
                self.entries.push(entry);
            } else {
                settle(registry, entry);
            }
        }
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferToken;
    use crate::size_class::SizeClass;

    fn retired(registry: &mut Registry) -> (Idle<u8>, BufferToken) {
        let (id, generation) = registry.allocate();
        let token = BufferToken::new(id, generation);
        registry.quarantine(token).unwrap();
        let idle = Idle {
            data: Vec::with_capacity(4),
            id,
            class: SizeClass::MIN,
        };
        (idle, token)
    }

    #[test]
    fn test_sweep_settles_unpinned() {
        let mut registry = Registry::new();
        let mut quarantine = Quarantine::new();
        let (a, _) = retired(&mut registry);
        let (b, _) = retired(&mut registry);
        quarantine.push(a);
        quarantine.push(b);

        let mut settled = 0;
        let left = quarantine.sweep(&mut registry, |registry, idle| {
            registry.recycle(idle.id);
            settled += 1;
        });
        assert_eq!(settled, 2);
        assert_eq!(left, 0);
        assert_eq!(quarantine.len(), 0);
    }

    #[test]
    fn test_sweep_keeps_pinned() {
        let mut registry = Registry::new();
        let mut quarantine = Quarantine::new();
        let (a, token) = retired(&mut registry);
        registry.pin(token).unwrap();
        quarantine.push(a);

        let left = quarantine.sweep(&mut registry, |_, _| panic!("pinned entry settled"));
        assert_eq!(left, 1);

        registry.unpin(token);
        let left = quarantine.sweep(&mut registry, |registry, idle| registry.vacate(idle.id));
        assert_eq!(left, 0);
    }
}
