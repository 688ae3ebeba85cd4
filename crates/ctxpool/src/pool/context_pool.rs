use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;

use crate::coords::Extent;
use crate::device::ContextBackend;
use crate::time::{Clock, SystemClock};

use super::handle::{Entry, Slot};
use super::{HandleId, HandleInfo, HandleState, PoolConfig, PoolCounters, PoolError, PoolStats};

/// Source of per-pool tags stamped into every `HandleId`.
static NEXT_POOL_TAG: AtomicU32 = AtomicU32::new(0);

/// Bounded pool of rendering contexts.
///
/// Handle lifecycle: `Created -> Free <-> InUse -> Destroyed`. Creation happens
/// only inside `acquire` (the new handle is checked out immediately) and
/// destruction only inside `sweep` or `shutdown`, never for a handle that is
/// checked out during normal operation.
///
/// # Example
///
/// ```no_run
/// use ctxpool::device::SoftwareBackend;
/// use ctxpool::pool::{ContextPool, PoolConfig};
///
/// let mut pool = ContextPool::new(SoftwareBackend::new(), PoolConfig::default())?;
///
/// let id = pool.acquire(256, 256)?;
/// // ... draw through pool.with_handle(id, ...) ...
/// pool.release(id);
///
/// // Driven by the host timer.
/// pool.sweep();
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct ContextPool<B: ContextBackend, C: Clock = SystemClock> {
    backend: B,
    clock: C,
    config: PoolConfig,

    /// Distinguishes ids of this pool from ids issued by other pools.
    tag: u32,

    /// Never longer than `max_contexts`; vacant slots are refilled first.
    slots: Vec<Slot<B>>,

    /// Number of occupied slots.
    live: usize,

    counters: PoolCounters,
}

impl<B: ContextBackend> ContextPool<B> {
    /// Creates an empty pool stamped by the system monotonic clock.
    pub fn new(backend: B, config: PoolConfig) -> Result<Self> {
        Self::with_clock(backend, config, SystemClock)
    }
}

impl<B: ContextBackend, C: Clock> ContextPool<B, C> {
    /// Creates an empty pool with an explicit time source.
    pub fn with_clock(backend: B, config: PoolConfig, clock: C) -> Result<Self> {
        config.validate()?;

        log::debug!(
            "context pool ready: max_contexts={}, idle_timeout={:?}",
            config.max_contexts,
            config.idle_timeout
        );

        Ok(Self {
            backend,
            clock,
            slots: Vec::with_capacity(config.max_contexts),
            config,
            tag: NEXT_POOL_TAG.fetch_add(1, Ordering::Relaxed),
            live: 0,
            counters: PoolCounters::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Checks out a handle sized to `width` x `height`.
    ///
    /// Selection order:
    /// 1. the least-recently-freed free handle, resized if needed
    /// 2. a newly created handle, while below capacity
    /// 3. otherwise `CapacityExhausted`; there is no waiting
    ///
    /// A failed resize leaves the handle free at its old size and returns
    /// `ResourceCreationFailed`.
    pub fn acquire(&mut self, width: u32, height: u32) -> Result<HandleId, PoolError> {
        let extent = Extent::new(width, height);
        if !extent.fits(self.backend.max_dimension()) {
            return Err(PoolError::InvalidExtent { width, height });
        }

        let now = self.clock.now();

        if let Some(idx) = self.least_recently_freed() {
            let forced = self.live >= self.config.max_contexts;
            let slot = &mut self.slots[idx];

            if let Some(entry) = slot.entry.as_mut() {
                if entry.extent != extent {
                    if let Err(source) = self.backend.resize(&mut entry.surface, &mut entry.context, extent) {
                        log::warn!("resizing pooled context in slot {idx} to {width}x{height} failed: {source:#}");
                        return Err(PoolError::ResourceCreationFailed { width, height, source });
                    }
                    entry.extent = extent;
                }
                entry.in_use = true;
                entry.last_used = now;

                let id = HandleId::new(self.tag, idx as u32, slot.bump());
                if forced {
                    self.counters.forced_reuses += 1;
                    log::debug!("forced reuse of {id} at capacity ({width}x{height})");
                } else {
                    self.counters.reused += 1;
                    log::trace!("reused {id} ({width}x{height})");
                }
                return Ok(id);
            }
        }

        if self.live < self.config.max_contexts {
            return self.create(extent, now);
        }

        self.counters.exhausted += 1;
        log::warn!(
            "context pool exhausted: {} of {} handles in use",
            self.live,
            self.config.max_contexts
        );
        Err(PoolError::CapacityExhausted {
            max_contexts: self.config.max_contexts,
        })
    }

    /// Returns a handle to the pool.
    ///
    /// Unknown, stale, evicted, or already released ids are ignored.
    pub fn release(&mut self, id: HandleId) {
        let now = self.clock.now();
        match lease_mut(&mut self.slots, self.tag, id) {
            Some(entry) => {
                entry.in_use = false;
                entry.last_used = now;
                log::trace!("released {id}");
            }
            None => log::trace!("release of {id} ignored: not checked out"),
        }
    }

    /// Destroys every free handle idle for longer than `idle_timeout`.
    ///
    /// Backend teardown errors are logged and counted; the handle is dropped
    /// from the pool either way.
    pub fn sweep(&mut self) {
        let now = self.clock.now();
        let timeout = self.config.idle_timeout;
        let mut evicted = 0u64;

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let expired = slot.entry.as_ref().is_some_and(|e| {
                e.is_free() && now.saturating_duration_since(e.last_used) > timeout
            });
            if !expired {
                continue;
            }

            let Some(entry) = slot.entry.take() else {
                continue;
            };
            slot.bump();
            self.live -= 1;
            evicted += 1;

            if let Err(e) = self.backend.destroy(entry.surface, entry.context) {
                self.counters.teardown_failures += 1;
                log::warn!("teardown of pooled context in slot {idx} failed: {e:#}");
            }
        }

        if evicted > 0 {
            self.counters.evicted += evicted;
            log::debug!("sweep evicted {evicted} idle context(s), {} remain", self.live);
        }
    }

    /// Snapshot of the pool occupancy and lifetime counters.
    pub fn stats(&self) -> PoolStats {
        let in_use = self.occupied().filter(|(_, e)| e.in_use).count();
        PoolStats {
            total: self.live,
            in_use,
            available: self.live - in_use,
            max_contexts: self.config.max_contexts,
            lifetime: self.counters,
        }
    }

    /// Iterates over tracked handles.
    pub fn handles(&self) -> impl Iterator<Item = HandleInfo> + '_ {
        let now = self.clock.now();
        self.occupied().map(move |(slot, e)| HandleInfo {
            slot,
            extent: e.extent,
            state: if e.in_use { HandleState::InUse } else { HandleState::Free },
            since_last_used: now.saturating_duration_since(e.last_used),
        })
    }

    /// `true` while `id` is the current lease of a checked-out handle.
    pub fn is_in_use(&self, id: HandleId) -> bool {
        lease(&self.slots, self.tag, id).is_some()
    }

    /// Current size of the surface leased as `id`.
    pub fn extent(&self, id: HandleId) -> Option<Extent> {
        lease(&self.slots, self.tag, id).map(|e| e.extent)
    }

    pub fn surface(&self, id: HandleId) -> Option<&B::Surface> {
        lease(&self.slots, self.tag, id).map(|e| &e.surface)
    }

    pub fn context(&self, id: HandleId) -> Option<&B::Context> {
        lease(&self.slots, self.tag, id).map(|e| &e.context)
    }

    /// Runs `f` with the backend and the surface/context leased as `id`.
    ///
    /// Returns `None` without calling `f` when `id` is not checked out.
    pub fn with_handle<R, F>(&mut self, id: HandleId, f: F) -> Option<R>
    where
        F: FnOnce(&mut B, &mut B::Surface, &mut B::Context) -> R,
    {
        let entry = lease_mut(&mut self.slots, self.tag, id)?;
        Some(f(&mut self.backend, &mut entry.surface, &mut entry.context))
    }

    /// Destroys every handle, checked out or not.
    ///
    /// Intended for owner teardown; outstanding ids become stale.
    pub fn shutdown(&mut self) {
        let mut destroyed = 0usize;
        for slot in &mut self.slots {
            let Some(entry) = slot.entry.take() else {
                continue;
            };
            slot.bump();
            destroyed += 1;

            if let Err(e) = self.backend.destroy(entry.surface, entry.context) {
                self.counters.teardown_failures += 1;
                log::warn!("teardown of pooled context failed during shutdown: {e:#}");
            }
        }
        self.live = 0;

        if destroyed > 0 {
            log::debug!("context pool shut down, destroyed {destroyed} context(s)");
        }
    }

    fn create(&mut self, extent: Extent, now: std::time::Instant) -> Result<HandleId, PoolError> {
        let (surface, context) =
            self.backend
                .create(extent)
                .map_err(|source| PoolError::ResourceCreationFailed {
                    width: extent.width,
                    height: extent.height,
                    source,
                })?;

        let idx = match self.slots.iter().position(|s| s.entry.is_none()) {
            Some(idx) => idx,
            None => {
                self.slots.push(Slot::vacant());
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[idx];
        slot.entry = Some(Entry {
            surface,
            context,
            extent,
            in_use: true,
            last_used: now,
        });
        let id = HandleId::new(self.tag, idx as u32, slot.bump());

        self.live += 1;
        self.counters.created += 1;
        log::debug!(
            "created {id} ({}x{}), {}/{} live",
            extent.width,
            extent.height,
            self.live,
            self.config.max_contexts
        );
        Ok(id)
    }

    /// Slot index of the free handle with the oldest `last_used`.
    ///
    /// Ties resolve to the lowest slot.
    fn least_recently_freed(&self) -> Option<usize> {
        self.occupied()
            .filter(|(_, e)| e.is_free())
            .min_by_key(|(_, e)| e.last_used)
            .map(|(slot, _)| slot as usize)
    }

    fn occupied(&self) -> impl Iterator<Item = (u32, &Entry<B>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| s.entry.as_ref().map(|e| (idx as u32, e)))
    }
}

impl<B: ContextBackend, C: Clock> Drop for ContextPool<B, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lease<B: ContextBackend>(slots: &[Slot<B>], tag: u32, id: HandleId) -> Option<&Entry<B>> {
    if id.pool() != tag {
        return None;
    }
    slots
        .get(id.slot() as usize)
        .filter(|s| s.generation == id.generation())
        .and_then(|s| s.entry.as_ref())
        .filter(|e| e.in_use)
}

fn lease_mut<B: ContextBackend>(slots: &mut [Slot<B>], tag: u32, id: HandleId) -> Option<&mut Entry<B>> {
    if id.pool() != tag {
        return None;
    }
    slots
        .get_mut(id.slot() as usize)
        .filter(|s| s.generation == id.generation())
        .and_then(|s| s.entry.as_mut())
        .filter(|e| e.in_use)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::coords::Viewport;
    use crate::device::{Canvas, ClearSurface, SoftwareBackend, SoftwareContext};
    use crate::paint::Color;
    use crate::time::ManualClock;

    type TestPool = ContextPool<SoftwareBackend, ManualClock>;

    fn pool(max_contexts: usize) -> (TestPool, ManualClock) {
        let clock = ManualClock::new();
        let config = PoolConfig {
            max_contexts,
            ..PoolConfig::default()
        };
        let pool = ContextPool::with_clock(SoftwareBackend::new(), config, clock.clone()).unwrap();
        (pool, clock)
    }

    fn assert_consistent<B: ContextBackend, C: Clock>(pool: &ContextPool<B, C>) {
        let s = pool.stats();
        assert_eq!(s.in_use + s.available, s.total);
        assert!(s.total <= s.max_contexts);
    }

    /// Software backend with switchable failures.
    struct FlakyBackend {
        inner: SoftwareBackend,
        fail_create: bool,
        fail_resize: bool,
        fail_destroy: bool,
        destroyed: Rc<Cell<usize>>,
    }

    impl FlakyBackend {
        fn new() -> Self {
            Self {
                inner: SoftwareBackend::new(),
                fail_create: false,
                fail_resize: false,
                fail_destroy: false,
                destroyed: Rc::new(Cell::new(0)),
            }
        }
    }

    impl ContextBackend for FlakyBackend {
        type Surface = Canvas;
        type Context = SoftwareContext;

        fn create(&mut self, extent: Extent) -> anyhow::Result<(Canvas, SoftwareContext)> {
            if self.fail_create {
                anyhow::bail!("driver refused context");
            }
            self.inner.create(extent)
        }

        fn resize(&mut self, surface: &mut Canvas, context: &mut SoftwareContext, extent: Extent) -> anyhow::Result<()> {
            if self.fail_resize {
                anyhow::bail!("out of device memory");
            }
            self.inner.resize(surface, context, extent)
        }

        fn destroy(&mut self, surface: Canvas, context: SoftwareContext) -> anyhow::Result<()> {
            self.destroyed.set(self.destroyed.get() + 1);
            if self.fail_destroy {
                anyhow::bail!("context lost during teardown");
            }
            self.inner.destroy(surface, context)
        }
    }

    // ── acquire ───────────────────────────────────────────────────────────

    #[test]
    fn first_acquire_creates_handle() {
        let (mut pool, _) = pool(8);
        let id = pool.acquire(64, 32).unwrap();

        assert!(pool.is_in_use(id));
        assert_eq!(pool.extent(id), Some(Extent::new(64, 32)));

        let s = pool.stats();
        assert_eq!((s.total, s.in_use, s.available), (1, 1, 0));
        assert_eq!(s.lifetime.created, 1);
    }

    #[test]
    fn reuse_before_create() {
        let (mut pool, _) = pool(8);
        let a = pool.acquire(10, 10).unwrap();
        pool.release(a);

        let b = pool.acquire(20, 20).unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_eq!(pool.stats().total, 1);
        assert_eq!(pool.stats().lifetime.reused, 1);
    }

    #[test]
    fn creates_when_all_busy_and_below_capacity() {
        let (mut pool, _) = pool(8);
        let a = pool.acquire(10, 10).unwrap();
        let b = pool.acquire(10, 10).unwrap();
        assert_ne!(a.slot(), b.slot());
        assert_eq!(pool.stats().total, 2);
    }

    #[test]
    fn forced_reuse_picks_least_recently_freed() {
        let (mut pool, clock) = pool(2);
        let a = pool.acquire(10, 10).unwrap();
        let b = pool.acquire(10, 10).unwrap();

        clock.set_millis(10);
        pool.release(a);
        clock.set_millis(20);
        pool.release(b);

        let c = pool.acquire(10, 10).unwrap();
        assert_eq!(c.slot(), a.slot());
        assert_eq!(pool.stats().lifetime.forced_reuses, 1);

        // The remaining free handle is B.
        let d = pool.acquire(10, 10).unwrap();
        assert_eq!(d.slot(), b.slot());
    }

    #[test]
    fn forced_reuse_ignores_release_order_of_slots() {
        let (mut pool, clock) = pool(2);
        let a = pool.acquire(10, 10).unwrap();
        let b = pool.acquire(10, 10).unwrap();

        clock.set_millis(10);
        pool.release(b);
        clock.set_millis(20);
        pool.release(a);

        assert_eq!(pool.acquire(10, 10).unwrap().slot(), b.slot());
    }

    #[test]
    fn exhaustion_fails_third_acquire() {
        let (mut pool, _) = pool(2);
        pool.acquire(10, 10).unwrap();
        pool.acquire(10, 10).unwrap();

        let err = pool.acquire(10, 10).unwrap_err();
        assert!(matches!(err, PoolError::CapacityExhausted { max_contexts: 2 }));
        assert_eq!(pool.stats().total, 2);
        assert_eq!(pool.stats().lifetime.exhausted, 1);
    }

    #[test]
    fn exhaustion_recovers_after_release() {
        let (mut pool, _) = pool(1);
        let a = pool.acquire(10, 10).unwrap();
        assert!(pool.acquire(10, 10).is_err());

        pool.release(a);
        assert!(pool.acquire(10, 10).is_ok());
    }

    #[test]
    fn resize_on_reuse() {
        let (mut pool, _) = pool(8);
        let a = pool.acquire(100, 100).unwrap();
        pool.release(a);

        let b = pool.acquire(50, 50).unwrap();
        assert_eq!(b.slot(), a.slot());
        assert_eq!(pool.extent(b), Some(Extent::new(50, 50)));
        assert_eq!(pool.surface(b).unwrap().extent(), Extent::new(50, 50));
        assert_eq!(pool.context(b).unwrap().viewport(), Viewport::new(50.0, 50.0));
    }

    #[test]
    fn reuse_keeps_context_binding() {
        let (mut pool, _) = pool(8);
        let a = pool.acquire(100, 100).unwrap();
        let ctx_id = pool.context(a).unwrap().id();
        pool.release(a);

        let b = pool.acquire(30, 40).unwrap();
        assert_eq!(pool.context(b).unwrap().id(), ctx_id);
    }

    #[test]
    fn zero_or_oversize_extent_is_rejected() {
        let clock = ManualClock::new();
        let mut pool =
            ContextPool::with_clock(SoftwareBackend::with_max_dimension(64), PoolConfig::default(), clock)
                .unwrap();

        assert!(matches!(
            pool.acquire(0, 10),
            Err(PoolError::InvalidExtent { width: 0, height: 10 })
        ));
        assert!(matches!(pool.acquire(65, 10), Err(PoolError::InvalidExtent { .. })));
        assert_eq!(pool.stats().total, 0);
    }

    #[test]
    fn creation_failure_is_typed_and_leaves_pool_untouched() {
        let mut backend = FlakyBackend::new();
        backend.fail_create = true;
        let mut pool = ContextPool::with_clock(backend, PoolConfig::default(), ManualClock::new()).unwrap();

        let err = pool.acquire(16, 16).unwrap_err();
        assert!(matches!(err, PoolError::ResourceCreationFailed { width: 16, height: 16, .. }));
        assert!(err.to_string().contains("driver refused context"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(pool.stats().total, 0);
    }

    #[test]
    fn resize_failure_leaves_handle_free() {
        let clock = ManualClock::new();
        let mut pool = ContextPool::with_clock(FlakyBackend::new(), PoolConfig::default(), clock.clone()).unwrap();
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);
        clock.set_millis(10);

        pool.backend_mut().fail_resize = true;
        let err = pool.acquire(16, 16).unwrap_err();
        assert!(matches!(err, PoolError::ResourceCreationFailed { width: 16, height: 16, .. }));
        assert!(err.to_string().contains("out of device memory"));

        let s = pool.stats();
        assert_eq!((s.total, s.in_use, s.available), (1, 0, 1));
        let info: Vec<_> = pool.handles().collect();
        assert_eq!(info[0].extent, Extent::new(8, 8));
        assert_eq!(info[0].state, HandleState::Free);
        // Free since t=0; the failed attempt did not touch last_used.
        assert_eq!(info[0].since_last_used, Duration::from_millis(10));

        // Same-size reuse needs no resize.
        let b = pool.acquire(8, 8).unwrap();
        assert_eq!(b.slot(), a.slot());
        pool.release(b);

        pool.backend_mut().fail_resize = false;
        let c = pool.acquire(16, 16).unwrap();
        assert_eq!(pool.extent(c), Some(Extent::new(16, 16)));
    }

    // ── ownership ─────────────────────────────────────────────────────────

    #[test]
    fn outstanding_handles_are_distinct() {
        let (mut pool, _) = pool(4);
        let ids: Vec<_> = (0..4).map(|_| pool.acquire(8, 8).unwrap()).collect();
        let slots: HashSet<_> = ids.iter().map(|id| id.slot()).collect();
        assert_eq!(slots.len(), 4);
    }

    #[test]
    fn stale_id_cannot_touch_next_lease() {
        let (mut pool, _) = pool(1);
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);
        let b = pool.acquire(8, 8).unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a, b);

        pool.release(a);
        assert!(pool.is_in_use(b));
        assert!(pool.surface(a).is_none());
        assert_eq!(pool.stats().in_use, 1);
    }

    // ── release ───────────────────────────────────────────────────────────

    #[test]
    fn double_release_is_noop() {
        let (mut pool, clock) = pool(8);
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);
        let before = pool.stats();
        let info_before: Vec<_> = pool.handles().collect();

        clock.advance(Duration::from_secs(5));
        pool.release(a);

        assert_eq!(pool.stats(), before);
        // last_used was not refreshed by the second release.
        let info_after: Vec<_> = pool.handles().collect();
        assert_eq!(
            info_after[0].since_last_used,
            info_before[0].since_last_used + Duration::from_secs(5)
        );
    }

    #[test]
    fn release_after_eviction_is_noop() {
        let (mut pool, clock) = pool(8);
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);
        clock.advance(Duration::from_secs(120));
        pool.sweep();
        let before = pool.stats();

        pool.release(a);
        assert_eq!(pool.stats(), before);
    }

    #[test]
    fn release_of_out_of_range_id_is_noop() {
        let (mut pool, _) = pool(2);
        let (mut other, _) = self::pool(8);
        let ids: Vec<_> = (0..5).map(|_| other.acquire(8, 8).unwrap()).collect();

        pool.acquire(8, 8).unwrap();
        let before = pool.stats();
        // Slots 2.. do not exist in a two-handle pool.
        for &id in &ids[2..] {
            pool.release(id);
        }
        assert_eq!(pool.stats(), before);
    }

    #[test]
    fn ids_from_another_pool_are_ignored() {
        let (mut pool, _) = pool(2);
        let (mut other, _) = self::pool(2);

        let mine = pool.acquire(8, 8).unwrap();
        let theirs = other.acquire(8, 8).unwrap();
        assert_eq!((mine.slot(), mine.generation()), (theirs.slot(), theirs.generation()));
        assert_ne!(mine, theirs);

        pool.release(theirs);
        assert!(pool.is_in_use(mine));
        assert!(pool.surface(theirs).is_none());
        assert!(pool.with_handle(theirs, |_, _, _| ()).is_none());
        assert_eq!(pool.stats().in_use, 1);
    }

    // ── sweep ─────────────────────────────────────────────────────────────

    #[test]
    fn idle_eviction_after_timeout() {
        let (mut pool, clock) = pool(8);
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);

        clock.set_millis(59_999);
        pool.sweep();
        assert_eq!(pool.stats().total, 1);

        clock.set_millis(60_000);
        pool.sweep();
        assert_eq!(pool.stats().total, 1);

        clock.set_millis(60_001);
        pool.sweep();
        assert_eq!(pool.stats().total, 0);
        assert_eq!(pool.stats().lifetime.evicted, 1);
    }

    #[test]
    fn sweep_never_evicts_checked_out_handles() {
        let (mut pool, clock) = pool(8);
        let a = pool.acquire(8, 8).unwrap();

        clock.advance(Duration::from_secs(600));
        pool.sweep();
        assert!(pool.is_in_use(a));
        assert_eq!(pool.stats().total, 1);
    }

    #[test]
    fn sweep_only_evicts_expired_handles() {
        let (mut pool, clock) = pool(8);
        let a = pool.acquire(8, 8).unwrap();
        let b = pool.acquire(8, 8).unwrap();
        pool.release(a);

        clock.set_millis(30_000);
        pool.release(b);

        clock.set_millis(70_000);
        pool.sweep();

        let remaining: Vec<_> = pool.handles().collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slot, b.slot());
        assert_eq!(remaining[0].state, HandleState::Free);
    }

    #[test]
    fn reacquire_refreshes_idle_timer() {
        let (mut pool, clock) = pool(8);
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);

        clock.set_millis(50_000);
        let b = pool.acquire(8, 8).unwrap();
        clock.set_millis(55_000);
        pool.release(b);

        clock.set_millis(100_000);
        pool.sweep();
        assert_eq!(pool.stats().total, 1);
    }

    #[test]
    fn evicted_slot_is_recycled_with_new_generation() {
        let (mut pool, clock) = pool(1);
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);
        clock.advance(Duration::from_secs(61));
        pool.sweep();

        let b = pool.acquire(8, 8).unwrap();
        assert_eq!(b.slot(), a.slot());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(pool.stats().lifetime.created, 2);
    }

    #[test]
    fn teardown_failure_is_swallowed() {
        let mut backend = FlakyBackend::new();
        backend.fail_destroy = true;
        let destroyed = backend.destroyed.clone();

        let clock = ManualClock::new();
        let mut pool = ContextPool::with_clock(backend, PoolConfig::default(), clock.clone()).unwrap();
        let a = pool.acquire(8, 8).unwrap();
        pool.release(a);

        clock.advance(Duration::from_secs(61));
        pool.sweep();

        assert_eq!(destroyed.get(), 1);
        let s = pool.stats();
        assert_eq!(s.total, 0);
        assert_eq!(s.lifetime.evicted, 1);
        assert_eq!(s.lifetime.teardown_failures, 1);
    }

    // ── access / teardown ─────────────────────────────────────────────────

    #[test]
    fn with_handle_draws_into_leased_surface() {
        let (mut pool, _) = pool(8);
        let a = pool.acquire(4, 4).unwrap();

        let drawn = pool.with_handle(a, |backend, surface, context| {
            backend.clear(surface, context, Color::from_srgb_u8(0, 255, 0, 255));
        });
        assert!(drawn.is_some());
        assert_eq!(pool.surface(a).unwrap().pixel(3, 3), Some([0, 255, 0, 255]));

        pool.release(a);
        assert!(pool.with_handle(a, |_, _, _| ()).is_none());
    }

    #[test]
    fn shutdown_destroys_every_handle() {
        let backend = FlakyBackend::new();
        let destroyed = backend.destroyed.clone();
        {
            let mut pool = ContextPool::with_clock(backend, PoolConfig::default(), ManualClock::new()).unwrap();
            let a = pool.acquire(8, 8).unwrap();
            pool.acquire(8, 8).unwrap();
            pool.release(a);

            pool.shutdown();
            assert_eq!(destroyed.get(), 2);
            assert_eq!(pool.stats().total, 0);
            assert!(!pool.is_in_use(a));
        }
        // Drop after shutdown has nothing left to destroy.
        assert_eq!(destroyed.get(), 2);
    }

    #[test]
    fn drop_destroys_remaining_handles() {
        let backend = FlakyBackend::new();
        let destroyed = backend.destroyed.clone();
        {
            let mut pool = ContextPool::with_clock(backend, PoolConfig::default(), ManualClock::new()).unwrap();
            pool.acquire(8, 8).unwrap();
            pool.acquire(8, 8).unwrap();
            pool.acquire(8, 8).unwrap();
        }
        assert_eq!(destroyed.get(), 3);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PoolConfig {
            max_contexts: 0,
            ..PoolConfig::default()
        };
        assert!(ContextPool::new(SoftwareBackend::new(), config).is_err());
    }

    // ── invariants ────────────────────────────────────────────────────────

    #[test]
    fn invariants_hold_over_mixed_traffic() {
        let (mut pool, clock) = pool(3);
        let mut held: Vec<HandleId> = Vec::new();
        let mut seed: u32 = 0x2545_f491;

        for _ in 0..2_000 {
            // xorshift32
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;

            match seed % 4 {
                0 | 1 => {
                    let w = 1 + seed % 97;
                    let h = 1 + (seed >> 8) % 97;
                    match pool.acquire(w, h) {
                        Ok(id) => {
                            assert!(!held.contains(&id));
                            assert!(held.iter().all(|h| h.slot() != id.slot()));
                            held.push(id);
                        }
                        Err(PoolError::CapacityExhausted { .. }) => assert_eq!(held.len(), 3),
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                2 => {
                    if !held.is_empty() {
                        let id = held.swap_remove(seed as usize % held.len());
                        pool.release(id);
                        // Release twice now and then.
                        if seed & 0x100 != 0 {
                            pool.release(id);
                        }
                    }
                }
                _ => {
                    clock.advance(Duration::from_millis((seed % 40_000) as u64));
                    pool.sweep();
                }
            }

            assert_consistent(&pool);
            assert_eq!(pool.stats().in_use, held.len());
            for id in &held {
                assert!(pool.is_in_use(*id));
            }
        }
    }
}
