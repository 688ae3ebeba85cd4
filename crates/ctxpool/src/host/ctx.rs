use std::time::Instant;

use crate::device::ContextBackend;
use crate::pool::ContextPool;

/// Tick timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct TickTime {
    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic tick counter.
    pub tick_index: u64,
}

/// Per-tick context passed to `Host::on_tick`.
///
/// The pool is lent for the duration of the callback only; handle ids that
/// outlive the tick stay valid until released or the pool shuts down.
pub struct TickCtx<'a, B: ContextBackend> {
    pub pool: &'a mut ContextPool<B>,
    pub time: TickTime,
}
