//! Bounded rendering-context pool.
//!
//! A `ContextPool` owns at most `max_contexts` handles (surface + bound
//! context). Consumers check handles out with `acquire`, return them with
//! `release`, and the host calls `sweep` periodically to destroy handles that
//! stayed free longer than `idle_timeout`.
//!
//! The pool is single-owner and single-threaded: every operation takes
//! `&mut self` and finishes its bookkeeping before returning. Hosts that need
//! one pool per process construct it once and lend it out; there is no global.

mod config;
mod context_pool;
mod error;
mod handle;
mod stats;

pub use config::PoolConfig;
pub use context_pool::ContextPool;
pub use error::PoolError;
pub use handle::{HandleId, HandleInfo, HandleState};
pub use stats::{PoolCounters, PoolStats};
