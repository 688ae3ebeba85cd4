//! Time subsystem.
//!
//! Provides the monotonic time source the pool stamps handles with, and the
//! deadline tracker the host uses to drive periodic sweeps.
//! Intended usage:
//! - `SystemClock` in production, `ManualClock` in tests and replay tools
//! - one `SweepSchedule` per pool, polled from the host loop

mod clock;
mod sweep_schedule;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sweep_schedule::SweepSchedule;
