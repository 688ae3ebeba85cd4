//! Rendering-context backends.
//!
//! This module is responsible for:
//! - the `ContextBackend` seam the pool allocates through
//! - a headless wgpu backend (off-screen render-attachment textures)
//! - a CPU software backend used when no GPU adapter is available

mod backend;
mod gpu;
mod init;
mod software;

pub use backend::{ClearSurface, ContextBackend};
pub use gpu::{OffscreenSurface, RenderContext, WgpuBackend};
pub use init::HeadlessInit;
pub use software::{Canvas, SoftwareBackend, SoftwareContext};
