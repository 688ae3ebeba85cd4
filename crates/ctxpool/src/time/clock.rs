use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock-independent monotonic time (`Instant::now`).
#[derive(Debug, Copy, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
///
/// Clones share the same offset, so a test can keep one clone and hand the
/// other to a pool. Time only moves when `advance` or `set` is called.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Moves time forward by `dt`.
    pub fn advance(&self, dt: Duration) {
        self.offset.set(self.offset.get() + dt);
    }

    /// Sets the elapsed time since the clock origin.
    ///
    /// Going backwards is ignored to keep the clock monotonic.
    pub fn set(&self, since_origin: Duration) {
        if since_origin >= self.offset.get() {
            self.offset.set(since_origin);
        }
    }

    /// Sets the elapsed time in milliseconds.
    pub fn set_millis(&self, ms: u64) {
        self.set(Duration::from_millis(ms));
    }

    /// Elapsed time since the clock origin.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}
