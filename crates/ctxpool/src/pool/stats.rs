/// Lifetime counters of a pool.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PoolCounters {
    /// Handles created by `acquire`.
    pub created: u64,
    /// Acquisitions served by a free handle while below capacity.
    pub reused: u64,
    /// Acquisitions served by the least-recently-freed handle at capacity.
    pub forced_reuses: u64,
    /// Acquisitions rejected with `CapacityExhausted`.
    pub exhausted: u64,
    /// Handles destroyed by `sweep`.
    pub evicted: u64,
    /// Backend teardown errors swallowed during destruction.
    pub teardown_failures: u64,
}

/// Point-in-time snapshot returned by `ContextPool::stats`.
///
/// Invariant: `in_use + available == total <= max_contexts`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
    pub available: usize,
    pub max_contexts: usize,
    pub lifetime: PoolCounters,
}
