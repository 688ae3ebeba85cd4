use std::time::{Duration, Instant};

use anyhow::Result;

use crate::time::SweepSchedule;

/// Pool tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Hard ceiling on simultaneously live handles.
    ///
    /// Keep this below the platform's own context limit; exceeding that limit
    /// fails context creation process-wide, not just for this pool.
    pub max_contexts: usize,

    /// How long a free handle may sit unused before `sweep` destroys it.
    pub idle_timeout: Duration,

    /// Period of the host-driven sweep.
    pub sweep_interval: Duration,
}

impl PoolConfig {
    pub const DEFAULT_MAX_CONTEXTS: usize = 8;
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(60_000);
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(30_000);

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_contexts > 0, "max_contexts must be at least 1");
        anyhow::ensure!(!self.sweep_interval.is_zero(), "sweep_interval must be non-zero");
        Ok(())
    }

    /// Sweep schedule anchored at `start`.
    pub fn sweep_schedule(&self, start: Instant) -> SweepSchedule {
        SweepSchedule::new(self.sweep_interval, start)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_contexts: Self::DEFAULT_MAX_CONTEXTS,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
        }
    }
}
