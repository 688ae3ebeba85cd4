//! Host runtime.
//!
//! Owns the single `ContextPool` of a process and drives it from a winit event
//! loop: consumers run in `Host::on_tick`, and idle sweeps fire from the same
//! loop when the sweep deadline passes. Both happen on one thread, so the pool
//! never needs a lock.

mod app;
mod ctx;
mod runtime;

pub use app::{Host, HostControl};
pub use ctx::{TickCtx, TickTime};
pub use runtime::{Runtime, RuntimeConfig};
