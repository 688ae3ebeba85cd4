use std::fmt;

/// Failure of `ContextPool::acquire`.
///
/// Every variant is fatal to the call, never to the pool. Callers decide the
/// fallback (skip the effect, render statically, sweep and retry once).
#[derive(Debug)]
pub enum PoolError {
    /// Every handle is checked out and the pool is at capacity.
    CapacityExhausted { max_contexts: usize },

    /// The backend refused to create a surface/context pair.
    ResourceCreationFailed {
        width: u32,
        height: u32,
        source: anyhow::Error,
    },

    /// Zero-sized request, or larger than the backend can allocate.
    InvalidExtent { width: u32, height: u32 },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::CapacityExhausted { max_contexts } => {
                write!(f, "all {max_contexts} rendering contexts are in use")
            }
            PoolError::ResourceCreationFailed { width, height, source } => {
                write!(f, "failed to create a {width}x{height} rendering context: {source}")
            }
            PoolError::InvalidExtent { width, height } => {
                write!(f, "invalid surface size {width}x{height}")
            }
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::ResourceCreationFailed { source, .. } => Some(&**source),
            _ => None,
        }
    }
}
