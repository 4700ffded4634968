//! Error types for the engine core.

use crate::handle::Handle;
use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A fixed-capacity pool has no free slot left.
    #[error("Pool capacity exceeded ({capacity} slots)")]
    CapacityExceeded {
        /// Capacity of the pool that overflowed.
        capacity: usize,
    },

    /// A handle does not refer to a live slot.
    #[error("Invalid handle {0}")]
    InvalidHandle(Handle),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, CoreError>;
