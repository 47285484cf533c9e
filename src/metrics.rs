//! Pool statistics.
//!
//! - [`PoolStats`] - counters and gauges for one pool
//! - [`MaintainReport`] - outcome of a single quarantine sweep

/// Counters accumulated by a pool since it was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counters {
    pub(crate) rents: u64,
    pub(crate) reused: u64,
    pub(crate) fresh: u64,
    pub(crate) retired: u64,
    pub(crate) released: u64,
    pub(crate) recycled: u64,
    pub(crate) discarded: u64,
    pub(crate) sweeps: u64,
}

/// Snapshot of pool activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total rent calls that succeeded.
    pub rents: u64,
    /// Rents served from a free list.
    pub reused: u64,
    /// Rents that allocated fresh storage.
    pub fresh: u64,
    /// Buffers moved into quarantine.
    pub retired: u64,
    /// Buffers returned directly, bypassing quarantine.
    pub released: u64,
    /// Buffers placed on a free list.
    pub recycled: u64,
    /// Buffers dropped instead of retained.
    pub discarded: u64,
    /// Maintenance sweeps run.
    pub sweeps: u64,
    /// Descriptors currently lent to containers.
    pub lent: usize,
    /// Buffers currently waiting in quarantine.
    pub quarantined: usize,
    /// Idle buffers on the free lists.
    pub retained_buffers: usize,
    /// Sum of the capacities of idle buffers, in elements.
    pub retained_elements: usize,
}

impl PoolStats {
    pub(crate) fn from_counters(counters: &Counters) -> Self {
        Self {
            rents: counters.rents,
            reused: counters.reused,
            fresh: counters.fresh,
            retired: counters.retired,
            released: counters.released,
            recycled: counters.recycled,
            discarded: counters.discarded,
            sweeps: counters.sweeps,
            ..Default::default()
        }
    }

    /// Share of rents served from a free list, as a percentage (0.0 - 100.0).
    pub fn reuse_ratio(&self) -> f64 {
        if self.rents == 0 {
            0.0
        } else {
            (self.reused as f64 / self.rents as f64) * 100.0
        }
    }
}

/// What one [`Pool::maintain`](crate::Pool::maintain) call did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintainReport {
    /// Entries moved to a free list.
    pub recycled: usize,
    /// Entries dropped because the policy did not allow retaining them.
    pub discarded: usize,
    /// Entries left in quarantine because views are still pinned.
    pub pinned: usize,
}

impl MaintainReport {
    /// Whether the sweep touched anything.
    pub fn is_empty(&self) -> bool {
        self.recycled == 0 && self.discarded == 0 && self.pinned == 0
    }
}
