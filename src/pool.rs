//! The buffer pool: size-classed free lists, quarantine and policy.
//!
//! A [`Pool`] is a cheap handle to shared state. Every container is created
//! against a pool and keeps a handle to it so that growth and disposal can
//! return storage. [`Pool::global`] gives a process-wide default instance;
//! tests and embedders can create independent pools with [`Pool::new`].
//!
//! The pool keeps one set of free lists and one quarantine per element
//! type, so a `Vec<u32>` retired by a list is only ever reused as
//! `u32` storage.
//!
//! # Locking
//!
//! State sits behind a single mutex. It is taken by rent, retire, release,
//! pin and maintain; container reads, writes and probes never touch it.
//! Element destructors always run before the lock is taken.

use crate::buffer::{Buffer, BufferId, BufferToken, ViewPin};
use crate::config::Policy;
use crate::error::{PoolError, PoolResult};
use crate::free_list::{FreeLists, Idle};
use crate::metrics::{Counters, MaintainReport, PoolStats};
use crate::quarantine::Quarantine;
use crate::registry::{DescriptorState, Registry};
use crate::size_class::SizeClass;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Free lists and quarantine for one element type.
struct TypedStore<T> {
    free: FreeLists<T>,
    quarantine: Quarantine<T>,
}

impl<T> TypedStore<T> {
    fn new() -> Self {
        Self {
            free: FreeLists::new(),
            quarantine: Quarantine::new(),
        }
    }
}

/// Type-erased view of a [`TypedStore`] so maintenance can visit every
/// element type without knowing it.
trait ErasedStore: Send {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn maintain(&mut self, registry: &mut Registry, policy: &Policy, report: &mut MaintainReport);

    fn trim(&mut self, registry: &mut Registry) -> usize;

    fn quarantined(&self) -> usize;

    fn retained_buffers(&self) -> usize;

    fn retained_elements(&self) -> usize;
}

impl<T: Send + 'static> ErasedStore for TypedStore<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn maintain(&mut self, registry: &mut Registry, policy: &Policy, report: &mut MaintainReport) {
        let free = &mut self.free;
        let mut recycled = 0;
        let mut discarded = 0;

        let pinned = self.quarantine.sweep(registry, |registry, idle| {
            let id = idle.id;
            match free.try_push(idle, policy) {
                Ok(()) => {
                    registry.recycle(id);
                    recycled += 1;
                }
                Err(_dropped) => {
                    registry.vacate(id);
                    discarded += 1;
                }
            }
        });

        report.recycled += recycled;
        report.discarded += discarded;
        report.pinned += pinned;
    }

    fn trim(&mut self, registry: &mut Registry) -> usize {
        let drained = self.free.drain();
        for idle in &drained {
            registry.vacate(idle.id);
        }
        drained.len()
    }

    fn quarantined(&self) -> usize {
        self.quarantine.len()
    }

    fn retained_buffers(&self) -> usize {
        self.free.retained_buffers()
    }

    fn retained_elements(&self) -> usize {
        self.free.retained_elements()
    }
}

type Stores = HashMap<TypeId, Box<dyn ErasedStore>>;

/// Look up (or create) the store for element type `T`.
fn typed<T: Send + 'static>(stores: &mut Stores) -> &mut TypedStore<T> {
    let store = stores
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(TypedStore::<T>::new()));
    match store.as_any_mut().downcast_mut::<TypedStore<T>>() {
        Some(store) => store,
        None => unreachable!("store registered under a foreign TypeId"),
    }
}

struct PoolState {
    policy: Policy,
    registry: Registry,
    stores: Stores,
    counters: Counters,
}

impl PoolState {
    fn maintain(&mut self) -> MaintainReport {
        let mut report = MaintainReport::default();
        let PoolState {
            policy,
            registry,
            stores,
            counters,
        } = self;

        for store in stores.values_mut() {
            store.maintain(registry, policy, &mut report);
        }

        counters.sweeps += 1;
        counters.recycled += report.recycled as u64;
        counters.discarded += report.discarded as u64;

        if !report.is_empty() {
            debug!(
                recycled = report.recycled,
                discarded = report.discarded,
                pinned = report.pinned,
                "quarantine swept"
            );
        }
        report
    }
}

/// Handle to a buffer pool.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Mutex<PoolState>>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}

impl Pool {
    /// Create an independent pool with the given policy.
    pub fn new(policy: Policy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolState {
                policy,
                registry: Registry::new(),
                stores: HashMap::new(),
                counters: Counters::default(),
            })),
        }
    }

    /// The process-wide default pool, created with [`Policy::default`] on
    /// first use.
    pub fn global() -> Pool {
        static GLOBAL: OnceLock<Pool> = OnceLock::new();
        GLOBAL.get_or_init(Pool::default).clone()
    }

    /// Whether two handles refer to the same pool.
    #[inline]
    pub fn same_pool(&self, other: &Pool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current policy.
    pub fn policy(&self) -> Policy {
        self.inner.lock().policy
    }

    /// Replace the policy. Takes effect for subsequent operations only.
    pub fn set_policy(&self, policy: Policy) {
        self.inner.lock().policy = policy;
    }

    /// Toggle retention of released buffers.
    pub fn set_retain_on_release(&self, enabled: bool) {
        self.inner.lock().policy.retain_on_release = enabled;
    }

    /// Set the largest capacity (elements) a retained buffer may have.
    pub fn set_max_retained_length(&self, length: usize) {
        self.inner.lock().policy.max_retained_length = length;
    }

    /// Toggle automatic quarantine sweeps after each retirement.
    pub fn set_auto_maintain(&self, enabled: bool) {
        self.inner.lock().policy.auto_maintain = enabled;
    }

    /// Set the idle buffer count cap per size class.
    pub fn set_per_class_limit(&self, limit: usize) {
        self.inner.lock().policy.per_class_limit = limit;
    }

    /// Rent storage for at least `capacity` elements.
    ///
    /// Returns an idle buffer of the matching size class (or a slightly
    /// larger one) when one is available, else allocates fresh storage.
    pub fn rent<T: Send + 'static>(&self, capacity: usize) -> PoolResult<Buffer<T>> {
        let class = SizeClass::for_capacity(capacity)?;

        {
            let mut state = self.inner.lock();
            let PoolState {
                registry,
                stores,
                counters,
                ..
            } = &mut *state;

            if let Some(idle) = typed::<T>(stores).free.pop(class) {
                let generation = registry.lend(idle.id);
                counters.rents += 1;
                counters.reused += 1;
                trace!(buffer = %idle.id, capacity = idle.class.capacity(), "rent reused");
                let token = BufferToken::new(idle.id, generation);
                return Ok(Buffer::from_parts(idle.data, token, idle.class, self.clone()));
            }
        }

        let mut data = Vec::new();
        data.try_reserve_exact(class.capacity())
            .map_err(|_| PoolError::AllocationFailed {
                bytes: class.capacity().saturating_mul(std::mem::size_of::<T>()),
            })?;

        let (id, generation) = {
            let mut state = self.inner.lock();
            state.counters.rents += 1;
            state.counters.fresh += 1;
            state.registry.allocate()
        };
        trace!(buffer = %id, capacity = class.capacity(), "rent fresh");

        Ok(Buffer::from_parts(
            data,
            BufferToken::new(id, generation),
            class,
            self.clone(),
        ))
    }

    /// Sweep quarantine: recycle or discard every entry without live pins.
    ///
    /// Call this at a quiet point, e.g. once per processing cycle, unless
    /// the policy has `auto_maintain` set. Calling it rarely only delays
    /// reuse.
    pub fn maintain(&self) -> MaintainReport {
        self.inner.lock().maintain()
    }

    /// Check that `token` still describes the live generation of its
    /// descriptor.
    pub fn validate(&self, token: BufferToken) -> PoolResult<()> {
        self.inner.lock().registry.validate(token)
    }

    /// Lifecycle state of a descriptor, `None` for ids this pool never issued.
    pub fn descriptor_state(&self, id: BufferId) -> Option<DescriptorState> {
        self.inner.lock().registry.state(id)
    }

    /// Number of buffers waiting in quarantine, across all element types.
    pub fn quarantined(&self) -> usize {
        let state = self.inner.lock();
        state.stores.values().map(|s| s.quarantined()).sum()
    }

    /// Idle buffers retained for element type `T`.
    pub fn retained_buffers<T: Send + 'static>(&self) -> usize {
        let state = self.inner.lock();
        state
            .stores
            .get(&TypeId::of::<T>())
            .map_or(0, |s| s.retained_buffers())
    }

    /// Total capacity, in elements, of the idle buffers retained for `T`.
    pub fn retained_elements<T: Send + 'static>(&self) -> usize {
        let state = self.inner.lock();
        state
            .stores
            .get(&TypeId::of::<T>())
            .map_or(0, |s| s.retained_elements())
    }

    /// Drop every idle buffer. Returns how many were dropped.
    pub fn trim(&self) -> usize {
        let mut state = self.inner.lock();
        let PoolState {
            registry, stores, ..
        } = &mut *state;
        let trimmed = stores.values_mut().map(|s| s.trim(registry)).sum();
        state.counters.discarded += trimmed as u64;
        if trimmed > 0 {
            debug!(trimmed, "free lists trimmed");
        }
        trimmed
    }

    /// Snapshot of counters and gauges.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let mut stats = PoolStats::from_counters(&state.counters);
        stats.lent = state.registry.lent();
        for store in state.stores.values() {
            stats.quarantined += store.quarantined();
            stats.retained_buffers += store.retained_buffers();
            stats.retained_elements += store.retained_elements();
        }
        stats
    }

    /// Move lent storage into quarantine.
    pub(crate) fn retire_storage<T: Send + 'static>(
        &self,
        token: BufferToken,
        class: SizeClass,
        mut data: Vec<T>,
    ) -> PoolResult<()> {
        data.clear();

        let mut state = self.inner.lock();
        let PoolState {
            policy,
            registry,
            stores,
            counters,
        } = &mut *state;

        registry.quarantine(token)?;
        typed::<T>(stores).quarantine.push(Idle {
            data,
            id: token.id(),
            class,
        });
        counters.retired += 1;
        trace!(buffer = %token.id(), capacity = class.capacity(), "retired");

        let auto_maintain = policy.auto_maintain;
        if auto_maintain {
            state.maintain();
        }
        Ok(())
    }

    /// Return lent storage directly to the free lists.
    pub(crate) fn release_storage<T: Send + 'static>(
        &self,
        token: BufferToken,
        class: SizeClass,
        mut data: Vec<T>,
    ) -> PoolResult<()> {
        data.clear();

        let mut state = self.inner.lock();
        let PoolState {
            policy,
            registry,
            stores,
            counters,
        } = &mut *state;

        registry.check_lent(token)?;
        counters.released += 1;

        let id = token.id();
        let store = typed::<T>(stores);
        let idle = Idle { data, id, class };

        if registry.pins(id) > 0 {
            // views still refer to it; wait for maintain
            registry.quarantine(token)?;
            store.quarantine.push(idle);
            counters.retired += 1;
            return Ok(());
        }

        match store.free.try_push(idle, policy) {
            Ok(()) => {
                registry.recycle(id);
                counters.recycled += 1;
            }
            Err(_dropped) => {
                registry.vacate(id);
                counters.discarded += 1;
            }
        }
        trace!(buffer = %id, capacity = class.capacity(), "released");
        Ok(())
    }

    pub(crate) fn pin(&self, token: BufferToken) -> PoolResult<ViewPin> {
        self.inner.lock().registry.pin(token)?;
        Ok(ViewPin::new(self.clone(), token))
    }

    pub(crate) fn unpin(&self, token: BufferToken) {
        self.inner.lock().registry.unpin(token);
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("policy", &self.policy())
            .field("stats", &self.stats())
            .finish()
    }
}
