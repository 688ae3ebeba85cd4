//! Clear colors for pooled surfaces.
//!
//! Drawing is owned by the consumers; the pool only needs a color type to
//! reset a surface to a known state.

mod color;

pub use color::Color;
