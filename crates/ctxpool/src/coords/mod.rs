//! Size types shared by the pool and its backends.
//!
//! - `Extent` is the integer surface size a consumer asks for.
//! - `Viewport` is the float drawing region a context renders into.

mod extent;
mod viewport;

pub use extent::Extent;
pub use viewport::Viewport;
