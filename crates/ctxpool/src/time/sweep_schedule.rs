use std::time::{Duration, Instant};

/// Deadline tracker for periodic idle sweeps.
///
/// The schedule does not run anything itself; the owning loop polls it and
/// sweeps when `poll` reports the deadline has passed. Missed deadlines
/// (long stalls, suspended process) collapse into a single due sweep instead
/// of a burst of catch-up sweeps.
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    interval: Duration,
    next: Instant,
    sweeps: u64,
}

impl SweepSchedule {
    /// Creates a schedule whose first deadline is one interval after `start`.
    pub fn new(interval: Duration, start: Instant) -> Self {
        debug_assert!(!interval.is_zero(), "sweep interval must be non-zero");
        Self {
            interval,
            next: start + interval,
            sweeps: 0,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant at which the next sweep is due.
    #[inline]
    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Number of deadlines consumed so far.
    #[inline]
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Returns `true` once per elapsed deadline and arms the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }

        self.next += self.interval;
        if self.next <= now {
            // Stalled for more than one interval; re-anchor on `now`.
            self.next = now + self.interval;
        }

        self.sweeps = self.sweeps.wrapping_add(1);
        true
    }
}
