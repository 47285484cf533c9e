//! Descriptor registry: lifecycle state and generation of every buffer.
//!
//! Each buffer the pool has ever handed out owns a slot in the registry.
//! The slot records where the buffer currently lives and a generation
//! counter that increases whenever the buffer leaves quarantine, so tokens
//! taken before a recycle can be told apart from the live descriptor.
//!
//! ```text
//!            rent (fresh)           retire             maintain
//!  Vacant ---------------> Lent -------------> Quarantined -------> Idle
//!    ^                      ^                        |               |
//!    |                      +------------------------+---------------+
//!    |                                rent (reuse)   |
//!    +-----------------------------------------------+ maintain (discard)
//! ```

use crate::buffer::{BufferId, BufferToken};
use crate::error::{PoolError, PoolResult};

/// Where a descriptor currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    /// Owned by exactly one container.
    Lent,
    /// Released, waiting for a maintenance sweep.
    Quarantined,
    /// On a free list, ready to be rented.
    Idle,
    /// Storage dropped; the slot may be reused for a new buffer.
    Vacant,
}

#[derive(Debug)]
struct Descriptor {
    generation: u64,
    state: DescriptorState,
    pins: u32,
}

/// Registry of all descriptors owned by one pool.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: Vec<Descriptor>,
    vacant: Vec<u32>,
    lent: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of descriptors currently lent out.
    pub(crate) fn lent(&self) -> usize {
        self.lent
    }

    fn slot(&self, id: BufferId) -> &Descriptor {
        &self.slots[id.as_raw() as usize]
    }

    fn slot_mut(&mut self, id: BufferId) -> &mut Descriptor {
        &mut self.slots[id.as_raw() as usize]
    }

    /// Register a freshly allocated buffer, already lent.
    pub(crate) fn allocate(&mut self) -> (BufferId, u64) {
        self.lent += 1;
        if let Some(raw) = self.vacant.pop() {
            let slot = &mut self.slots[raw as usize];
            debug_assert_eq!(slot.state, DescriptorState::Vacant);
            slot.state = DescriptorState::Lent;
            slot.pins = 0;
            return (BufferId::new(raw), slot.generation);
        }

        let raw = self.slots.len() as u32;
        self.slots.push(Descriptor {
            generation: 0,
            state: DescriptorState::Lent,
            pins: 0,
        });
        (BufferId::new(raw), 0)
    }

    /// Hand an idle descriptor to a new owner. Returns its generation.
    pub(crate) fn lend(&mut self, id: BufferId) -> u64 {
        self.lent += 1;
        let slot = self.slot_mut(id);
        debug_assert_eq!(slot.state, DescriptorState::Idle);
        slot.state = DescriptorState::Lent;
        slot.generation
    }

    /// Check that `token` names a descriptor that is still lent.
    pub(crate) fn check_lent(&self, token: BufferToken) -> PoolResult<()> {
        match self.slots.get(token.id().as_raw() as usize) {
            Some(slot)
                if slot.generation == token.generation()
                    && slot.state == DescriptorState::Lent =>
            {
                Ok(())
            }
            _ => Err(PoolError::DoubleRelease { id: token.id() }),
        }
    }

    /// Move a lent descriptor into quarantine.
    pub(crate) fn quarantine(&mut self, token: BufferToken) -> PoolResult<()> {
        self.check_lent(token)?;
        self.lent -= 1;
        self.slot_mut(token.id()).state = DescriptorState::Quarantined;
        Ok(())
    }

    /// Put a descriptor on a free list, starting a new generation.
    pub(crate) fn recycle(&mut self, id: BufferId) {
        let slot = self.slot_mut(id);
        if slot.state == DescriptorState::Lent {
            self.lent -= 1;
        }
        let slot = self.slot_mut(id);
        debug_assert_eq!(slot.pins, 0);
        slot.generation += 1;
        slot.state = DescriptorState::Idle;
    }

    /// Forget a descriptor whose storage was dropped.
    pub(crate) fn vacate(&mut self, id: BufferId) {
        let slot = self.slot_mut(id);
        if slot.state == DescriptorState::Lent {
            self.lent -= 1;
        }
        let slot = self.slot_mut(id);
        debug_assert_eq!(slot.pins, 0);
        slot.generation += 1;
        slot.state = DescriptorState::Vacant;
        self.vacant.push(id.as_raw());
    }

    /// Number of outstanding views on a descriptor.
    pub(crate) fn pins(&self, id: BufferId) -> u32 {
        self.slot(id).pins
    }

    /// Compare a token against the live descriptor.
    pub(crate) fn validate(&self, token: BufferToken) -> PoolResult<()> {
        let found = match self.slots.get(token.id().as_raw() as usize) {
            Some(slot) => slot.generation,
            None => {
                return Err(PoolError::StaleGeneration {
                    id: token.id(),
                    expected: token.generation(),
                    found: 0,
                });
            }
        };
        if found != token.generation() {
            return Err(PoolError::StaleGeneration {
                id: token.id(),
                expected: token.generation(),
                found,
            });
        }
        Ok(())
    }

    /// Register an outstanding view. Only live generations can be pinned.
    pub(crate) fn pin(&mut self, token: BufferToken) -> PoolResult<()> {
        self.validate(token)?;
        let slot = self.slot_mut(token.id());
        match slot.state {
            DescriptorState::Lent | DescriptorState::Quarantined => {
                slot.pins += 1;
                Ok(())
            }
            DescriptorState::Idle | DescriptorState::Vacant => Err(PoolError::StaleGeneration {
                id: token.id(),
                expected: token.generation(),
                found: slot.generation,
            }),
        }
    }

    /// Drop an outstanding view registered by [`pin`](Self::pin).
    pub(crate) fn unpin(&mut self, token: BufferToken) {
        let slot = self.slot_mut(token.id());
        debug_assert_eq!(slot.generation, token.generation());
        debug_assert!(slot.pins > 0, "unbalanced unpin on buffer {}", token.id());
        slot.pins = slot.pins.saturating_sub(1);
    }

    /// Current state of a descriptor, `None` for ids this registry never issued.
    pub(crate) fn state(&self, id: BufferId) -> Option<DescriptorState> {
        self.slots.get(id.as_raw() as usize).map(|slot| slot.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: BufferId, generation: u64) -> BufferToken {
        BufferToken::new(id, generation)
    }

    #[test]
    fn test_allocate_and_quarantine() {
        let mut registry = Registry::new();
        let (id, generation) = registry.allocate();
        assert_eq!(generation, 0);
        assert_eq!(registry.lent(), 1);
        assert_eq!(registry.state(id), Some(DescriptorState::Lent));

        registry.quarantine(token(id, generation)).unwrap();
        assert_eq!(registry.state(id), Some(DescriptorState::Quarantined));
        assert_eq!(registry.lent(), 0);
    }

    #[test]
    fn test_double_quarantine_is_error() {
        let mut registry = Registry::new();
        let (id, generation) = registry.allocate();
        registry.quarantine(token(id, generation)).unwrap();
        assert_eq!(
            registry.quarantine(token(id, generation)),
            Err(PoolError::DoubleRelease { id })
        );
    }

    #[test]
    fn test_recycle_bumps_generation() {
        let mut registry = Registry::new();
        let (id, generation) = registry.allocate();
        registry.quarantine(token(id, generation)).unwrap();
        registry.recycle(id);

        assert_eq!(registry.state(id), Some(DescriptorState::Idle));
        assert_eq!(
            registry.validate(token(id, generation)),
            Err(PoolError::StaleGeneration {
                id,
                expected: 0,
                found: 1
            })
        );

        let lent_generation = registry.lend(id);
        assert_eq!(lent_generation, 1);
        assert!(registry.validate(token(id, lent_generation)).is_ok());
    }

    #[test]
    fn test_vacant_slots_are_reused() {
        let mut registry = Registry::new();
        let (id, generation) = registry.allocate();
        registry.quarantine(token(id, generation)).unwrap();
        registry.vacate(id);
        assert_eq!(registry.state(id), Some(DescriptorState::Vacant));

        let (reused, reused_generation) = registry.allocate();
        assert_eq!(reused, id);
        assert_eq!(reused_generation, 1);
        assert!(registry.validate(token(id, generation)).is_err());
    }

    #[test]
    fn test_pins() {
        let mut registry = Registry::new();
        let (id, generation) = registry.allocate();
        registry.pin(token(id, generation)).unwrap();
        registry.pin(token(id, generation)).unwrap();
        assert_eq!(registry.pins(id), 2);

        registry.quarantine(token(id, generation)).unwrap();
        registry.unpin(token(id, generation));
        registry.unpin(token(id, generation));
        assert_eq!(registry.pins(id), 0);
    }

    #[test]
    fn test_pin_idle_is_stale() {
        let mut registry = Registry::new();
        let (id, generation) = registry.allocate();
        registry.quarantine(token(id, generation)).unwrap();
        registry.recycle(id);
        assert!(registry.pin(token(id, generation + 1)).is_err());
    }

    #[test]
    fn test_unknown_id() {
        let registry = Registry::new();
        assert!(registry.validate(token(BufferId::new(7), 0)).is_err());
        assert!(registry.check_lent(token(BufferId::new(7), 0)).is_err());
    }
}
