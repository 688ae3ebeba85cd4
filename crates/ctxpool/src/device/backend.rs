use anyhow::Result;

use crate::coords::Extent;
use crate::paint::Color;

/// Platform seam used by `ContextPool` to allocate and tear down handles.
///
/// A backend creates a surface together with the context bound to it. The
/// pair is never split: `resize` and `destroy` always receive both halves of
/// the same handle.
pub trait ContextBackend {
    /// Off-screen drawable backing store.
    type Surface;

    /// Rendering context bound to exactly one surface.
    type Context;

    /// Largest width or height the backend can allocate.
    fn max_dimension(&self) -> u32 {
        u32::MAX
    }

    /// Creates a surface of `extent` and its context.
    ///
    /// Errors mean the platform refused the allocation.
    fn create(&mut self, extent: Extent) -> Result<(Self::Surface, Self::Context)>;

    /// Resizes `surface` in place and resets the context viewport to the
    /// full new extent.
    ///
    /// On error the pair must be left untouched at its previous size.
    fn resize(&mut self, surface: &mut Self::Surface, context: &mut Self::Context, extent: Extent) -> Result<()>;

    /// Tears the pair down, releasing backing memory eagerly where possible.
    fn destroy(&mut self, surface: Self::Surface, context: Self::Context) -> Result<()>;
}

/// Backends able to reset a surface to a solid color.
pub trait ClearSurface: ContextBackend {
    fn clear(&mut self, surface: &mut Self::Surface, context: &mut Self::Context, color: Color);
}
