use anyhow::Result;

use crate::coords::{Extent, Viewport};
use crate::paint::Color;

use super::{ClearSurface, ContextBackend};

/// Default dimension ceiling, matching the common wgpu 2D texture limit.
const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// CPU pixel buffer in premultiplied RGBA8.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: Vec<[u8; 4]>,
    extent: Extent,
}

impl Canvas {
    fn new(extent: Extent) -> Self {
        Self {
            pixels: vec![[0; 4]; extent.area()],
            extent,
        }
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Raw bytes, row-major, 4 bytes per pixel.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.extent.width || y >= self.extent.height {
            return None;
        }
        let idx = y as usize * self.extent.width as usize + x as usize;
        self.pixels.get(idx).copied()
    }

    fn reallocate(&mut self, extent: Extent) {
        self.pixels.clear();
        self.pixels.resize(extent.area(), [0; 4]);
        self.pixels.shrink_to_fit();
        self.extent = extent;
    }
}

/// Context bound to one `Canvas`.
#[derive(Debug, Clone)]
pub struct SoftwareContext {
    id: u64,
    viewport: Viewport,
}

impl SoftwareContext {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

/// CPU backend, used as the fallback when no GPU adapter is available.
#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    max_dimension: u32,
    next_id: u64,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            next_id: 0,
        }
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBackend for SoftwareBackend {
    type Surface = Canvas;
    type Context = SoftwareContext;

    fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn create(&mut self, extent: Extent) -> Result<(Canvas, SoftwareContext)> {
        anyhow::ensure!(
            extent.fits(self.max_dimension),
            "canvas {}x{} outside limits (max {})",
            extent.width,
            extent.height,
            self.max_dimension
        );

        let id = self.next_id;
        self.next_id += 1;

        let context = SoftwareContext {
            id,
            viewport: extent.full_viewport(),
        };
        Ok((Canvas::new(extent), context))
    }

    fn resize(&mut self, surface: &mut Canvas, context: &mut SoftwareContext, extent: Extent) -> Result<()> {
        anyhow::ensure!(
            extent.fits(self.max_dimension),
            "canvas {}x{} outside limits (max {})",
            extent.width,
            extent.height,
            self.max_dimension
        );

        surface.reallocate(extent);
        context.viewport = extent.full_viewport();
        Ok(())
    }

    fn destroy(&mut self, surface: Canvas, context: SoftwareContext) -> Result<()> {
        log::trace!("releasing software canvas #{} ({} bytes)", context.id, surface.as_bytes().len());
        Ok(())
    }
}

impl ClearSurface for SoftwareBackend {
    fn clear(&mut self, surface: &mut Canvas, _context: &mut SoftwareContext, color: Color) {
        surface.pixels.fill(color.to_rgba8());
    }
}
