use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::event::{StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::device::ContextBackend;
use crate::pool::ContextPool;
use crate::time::SweepSchedule;

use super::app::{Host, HostControl};
use super::ctx::{TickCtx, TickTime};

/// Host loop configuration.
///
/// The sweep period comes from the pool's own `PoolConfig::sweep_interval`.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Period between `Host::on_tick` calls.
    pub tick_interval: Duration,

    /// Stop after this many ticks. `None` runs until the host exits.
    pub max_ticks: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            max_ticks: None,
        }
    }
}

/// Entry point for the host loop.
pub struct Runtime;

impl Runtime {
    /// Runs `host` against `pool` until the host exits or `max_ticks` is hit.
    ///
    /// Uses a winit event loop when the platform provides one (on Linux this
    /// needs a display server) and falls back to [`Runtime::run_headless`]
    /// otherwise. The pool is shut down (every handle destroyed) before
    /// returning.
    pub fn run<B, H>(config: RuntimeConfig, pool: ContextPool<B>, host: H) -> Result<()>
    where
        B: ContextBackend,
        H: Host<B>,
    {
        anyhow::ensure!(!config.tick_interval.is_zero(), "tick_interval must be non-zero");

        let event_loop = match EventLoop::new() {
            Ok(event_loop) => event_loop,
            Err(e) => {
                log::warn!("no winit event loop ({e}); running host on a sleeping timer");
                return Self::run_headless(config, pool, host);
            }
        };

        let mut state = HostState::new(config, pool, host);
        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }

    /// Runs `host` on the calling thread without an event loop, sleeping
    /// until the next tick or sweep deadline.
    pub fn run_headless<B, H>(config: RuntimeConfig, pool: ContextPool<B>, host: H) -> Result<()>
    where
        B: ContextBackend,
        H: Host<B>,
    {
        anyhow::ensure!(!config.tick_interval.is_zero(), "tick_interval must be non-zero");

        let mut state = HostState::new(config, pool, host);
        log::info!(
            "headless host loop started: tick every {:?}, sweep every {:?}",
            state.config.tick_interval,
            state.sweep.interval()
        );

        while !state.exit_requested {
            let now = Instant::now();
            state.run_due_sweep(now);
            state.run_due_tick(now);

            if state.exit_requested {
                break;
            }

            let wake = state.next_wake();
            std::thread::sleep(wake.saturating_duration_since(Instant::now()));
        }

        state.finish();
        Ok(())
    }
}

struct HostState<B, H>
where
    B: ContextBackend,
    H: Host<B>,
{
    config: RuntimeConfig,
    pool: ContextPool<B>,
    host: H,

    sweep: SweepSchedule,
    next_tick: Instant,
    tick_index: u64,

    exit_requested: bool,
}

impl<B, H> HostState<B, H>
where
    B: ContextBackend,
    H: Host<B>,
{
    fn new(config: RuntimeConfig, pool: ContextPool<B>, host: H) -> Self {
        let now = Instant::now();
        let sweep = pool.config().sweep_schedule(now);
        Self {
            config,
            pool,
            host,
            sweep,
            next_tick: now,
            tick_index: 0,
            exit_requested: false,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn run_due_sweep(&mut self, now: Instant) {
        if !self.sweep.poll(now) {
            return;
        }
        self.pool.sweep();
        let stats = self.pool.stats();
        self.host.on_sweep(&stats);
    }

    fn run_due_tick(&mut self, now: Instant) {
        if now < self.next_tick {
            return;
        }

        let time = TickTime {
            now,
            tick_index: self.tick_index,
        };

        let control = {
            let mut ctx = TickCtx {
                pool: &mut self.pool,
                time,
            };
            self.host.on_tick(&mut ctx)
        };

        self.tick_index = self.tick_index.wrapping_add(1);
        self.next_tick += self.config.tick_interval;
        if self.next_tick <= now {
            // Fell behind; skip missed ticks rather than bursting.
            self.next_tick = now + self.config.tick_interval;
        }

        let out_of_ticks = self
            .config
            .max_ticks
            .is_some_and(|max| self.tick_index >= max);

        if control == HostControl::Exit || out_of_ticks {
            self.request_exit();
        }
    }

    /// Earliest of the next tick and the next sweep deadline.
    fn next_wake(&self) -> Instant {
        self.next_tick.min(self.sweep.next_deadline())
    }

    /// Reports final stats to the host and destroys every pooled handle.
    fn finish(&mut self) {
        let stats = self.pool.stats();
        self.host.on_exit(&stats);
        log::info!(
            "host loop exiting after {} tick(s), {} sweep(s)",
            self.tick_index,
            self.sweep.sweeps()
        );
        self.pool.shutdown();
    }
}

impl<B, H> ApplicationHandler for HostState<B, H>
where
    B: ContextBackend,
    H: Host<B>,
{
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if let StartCause::Init = cause {
            log::info!(
                "host loop started: tick every {:?}, sweep every {:?}",
                self.config.tick_interval,
                self.sweep.interval()
            );
        }
    }

    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {
        // Windowless: nothing to (re)create on resume.
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        _event: WindowEvent,
    ) {
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let now = Instant::now();
        self.run_due_sweep(now);
        self.run_due_tick(now);

        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_wake()));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.finish();
    }
}
