//! Bounded rendering-context pool.
//!
//! This crate arbitrates a small, platform-capped number of off-screen
//! rendering contexts between many consumers, with reuse, idle eviction and
//! a host loop that drives periodic sweeps.

pub mod device;
pub mod host;
pub mod pool;
pub mod time;

pub mod logging;
pub mod coords;
pub mod paint;
