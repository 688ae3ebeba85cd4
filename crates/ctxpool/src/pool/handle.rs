use std::fmt;
use std::time::{Duration, Instant};

use crate::coords::Extent;
use crate::device::ContextBackend;

/// Opaque identity of one lease on a pooled handle.
///
/// `slot` addresses the handle; `generation` changes on every acquisition and
/// on destruction, so an id from an earlier lease never matches a later one.
/// Ids also carry the tag of the pool that issued them; another pool treats
/// them as unknown.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HandleId {
    pool: u32,
    slot: u32,
    generation: u32,
}

impl HandleId {
    #[inline]
    pub(crate) const fn new(pool: u32, slot: u32, generation: u32) -> Self {
        Self { pool, slot, generation }
    }

    #[inline]
    pub(crate) const fn pool(self) -> u32 {
        self.pool
    }

    /// Index of the underlying handle. Stable across leases of that handle.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HandleState {
    Free,
    InUse,
}

/// Read-only view of one tracked handle, for diagnostics.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HandleInfo {
    pub slot: u32,
    pub extent: Extent,
    pub state: HandleState,
    /// Time since the handle last changed state.
    pub since_last_used: Duration,
}

pub(crate) struct Entry<B: ContextBackend> {
    pub surface: B::Surface,
    pub context: B::Context,
    pub extent: Extent,
    pub in_use: bool,
    pub last_used: Instant,
}

impl<B: ContextBackend> Entry<B> {
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.in_use
    }
}

/// Storage cell for one handle. Vacant after eviction until the next create.
pub(crate) struct Slot<B: ContextBackend> {
    pub generation: u32,
    pub entry: Option<Entry<B>>,
}

impl<B: ContextBackend> Slot<B> {
    #[inline]
    pub fn vacant() -> Self {
        Self { generation: 0, entry: None }
    }

    /// Advances the generation, invalidating ids of previous leases.
    #[inline]
    pub fn bump(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}
