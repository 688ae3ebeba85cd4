use crate::device::ContextBackend;
use crate::pool::PoolStats;

use super::ctx::TickCtx;

/// Control directive returned by host callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HostControl {
    Continue,
    Exit,
}

/// Consumer-side contract driven by `Runtime`.
pub trait Host<B: ContextBackend> {
    /// Called once per tick with exclusive access to the pool.
    fn on_tick(&mut self, ctx: &mut TickCtx<'_, B>) -> HostControl;

    /// Called after each scheduled sweep.
    fn on_sweep(&mut self, stats: &PoolStats) {
        let _ = stats;
    }

    /// Called once before the pool is shut down.
    fn on_exit(&mut self, stats: &PoolStats) {
        let _ = stats;
    }
}
