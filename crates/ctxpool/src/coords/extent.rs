use super::Viewport;

/// Surface size in physical pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are non-zero.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Both dimensions are non-zero and at most `max`.
    #[inline]
    pub const fn fits(self, max: u32) -> bool {
        self.is_valid() && self.width <= max && self.height <= max
    }

    /// Number of pixels covered by this extent.
    #[inline]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Viewport covering the full extent.
    #[inline]
    pub fn full_viewport(self) -> Viewport {
        Viewport::new(self.width as f32, self.height as f32)
    }
}
