use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use ctxpool::device::{ClearSurface, ContextBackend, HeadlessInit, SoftwareBackend, WgpuBackend};
use ctxpool::host::{Host, HostControl, Runtime, RuntimeConfig, TickCtx};
use ctxpool::logging::{init_logging, LoggingConfig};
use ctxpool::paint::Color;
use ctxpool::pool::{ContextPool, HandleId, PoolConfig, PoolError, PoolStats};
use ctxpool::time::Clock;

/// Ticks per traffic phase (busy, quiet, steady).
const PHASE_TICKS: u64 = 100;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    // Short timeouts so the quiet phase visibly drains the pool.
    let pool_config = PoolConfig {
        idle_timeout: Duration::from_secs(4),
        sweep_interval: Duration::from_secs(2),
        ..PoolConfig::default()
    };
    let runtime_config = RuntimeConfig {
        tick_interval: Duration::from_millis(50),
        max_ticks: Some(PHASE_TICKS * 3),
    };

    match WgpuBackend::new_blocking(HeadlessInit::default()) {
        Ok(backend) => run(backend, pool_config, runtime_config),
        Err(e) => {
            log::warn!("GPU unavailable ({e:#}); falling back to software contexts");
            run(SoftwareBackend::new(), pool_config, runtime_config)
        }
    }
}

fn run<B: ClearSurface>(backend: B, pool_config: PoolConfig, runtime_config: RuntimeConfig) -> Result<()> {
    let pool = ContextPool::new(backend, pool_config)?;
    Runtime::run(runtime_config, pool, BurstyConsumers::new())
}

/// Simulated effects that each borrow a context for a few ticks.
struct BurstyConsumers {
    /// Outstanding leases and the tick at which each one is returned.
    held: VecDeque<(HandleId, u64)>,
    seed: u32,
    skipped: u64,
}

impl BurstyConsumers {
    fn new() -> Self {
        Self {
            held: VecDeque::new(),
            seed: 0x9e37_79b9,
            skipped: 0,
        }
    }

    fn next_random(&mut self) -> u32 {
        // xorshift32
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 17;
        self.seed ^= self.seed << 5;
        self.seed
    }

    /// Acquires a context, sweeping once and retrying if the backend refused
    /// the allocation.
    ///
    /// A sweep frees the memory of timed-out idle handles, so it can turn a
    /// refused allocation into a successful one. Exhaustion is not retried:
    /// it means every handle is checked out, and sweeps never evict those.
    fn acquire_with_retry<B: ContextBackend, C: Clock>(
        pool: &mut ContextPool<B, C>,
        w: u32,
        h: u32,
    ) -> Result<HandleId, PoolError> {
        match pool.acquire(w, h) {
            Err(PoolError::ResourceCreationFailed { source, .. }) => {
                log::debug!("allocation of {w}x{h} refused ({source:#}); sweeping and retrying once");
                pool.sweep();
                pool.acquire(w, h)
            }
            other => other,
        }
    }
}

impl<B: ClearSurface> Host<B> for BurstyConsumers {
    fn on_tick(&mut self, ctx: &mut TickCtx<'_, B>) -> HostControl {
        let tick = ctx.time.tick_index;

        while let Some(&(id, until)) = self.held.front() {
            if until > tick {
                break;
            }
            self.held.pop_front();
            ctx.pool.release(id);
        }

        let wanted = match tick / PHASE_TICKS {
            0 => 3,
            1 => 0,
            _ => (self.next_random() % 2) as usize,
        };

        for _ in 0..wanted {
            let r = self.next_random();
            let (w, h) = (64 + r % 448, 64 + (r >> 9) % 448);

            match Self::acquire_with_retry(ctx.pool, w, h) {
                Ok(id) => {
                    let color = Color::from_srgb_u8((r >> 3) as u8, (r >> 11) as u8, (r >> 19) as u8, 255);
                    ctx.pool.with_handle(id, |backend, surface, context| {
                        backend.clear(surface, context, color);
                    });

                    let lease = 2 + u64::from(r % 12);
                    let pos = self.held.partition_point(|&(_, until)| until <= tick + lease);
                    self.held.insert(pos, (id, tick + lease));
                }
                Err(PoolError::CapacityExhausted { max_contexts }) => {
                    self.skipped += 1;
                    log::debug!("effect skipped: all {max_contexts} contexts busy");
                }
                Err(e) => {
                    log::error!("context acquisition failed: {e:#}");
                    return HostControl::Exit;
                }
            }
        }

        if tick % PHASE_TICKS == 0 {
            let s = ctx.pool.stats();
            log::info!(
                "tick {tick}: {} live ({} in use), {} created, {} forced reuses",
                s.total,
                s.in_use,
                s.lifetime.created,
                s.lifetime.forced_reuses
            );
        }

        HostControl::Continue
    }

    fn on_sweep(&mut self, stats: &PoolStats) {
        log::info!(
            "sweep: {} live ({} in use, {} free), {} evicted so far",
            stats.total,
            stats.in_use,
            stats.available,
            stats.lifetime.evicted
        );
    }

    fn on_exit(&mut self, stats: &PoolStats) {
        println!();
        println!("  context pool summary");
        println!("  ────────────────────────────────");
        println!("  created          {:>8}", stats.lifetime.created);
        println!("  reused           {:>8}", stats.lifetime.reused);
        println!("  forced reuses    {:>8}", stats.lifetime.forced_reuses);
        println!("  exhausted        {:>8}", stats.lifetime.exhausted);
        println!("  evicted          {:>8}", stats.lifetime.evicted);
        println!("  effects skipped  {:>8}", self.skipped);
        println!("  live at exit     {:>8}", stats.total);
        println!();
    }
}
