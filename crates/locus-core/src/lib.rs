//! Core types for the Locus engine.
//!
//! This crate provides the foundational types used throughout the engine:
//! - Generational handles ([`Handle`]) and strongly typed wrappers
//! - A generational slot pool ([`Pool`]) owning every long-lived engine object
//! - Engine-wide constants and the core error type

pub mod error;
pub mod handle;
pub mod pool;

pub use error::{CoreError, Result};
pub use handle::{Handle, PoolKey};
pub use pool::Pool;

/// Engine-wide constants
pub mod constants {
    /// Number of frames the CPU may record ahead of the GPU.
    pub const FRAMES_IN_FLIGHT: usize = 2;
    /// Maximum number of simultaneously open windows.
    pub const WINDOW_COUNT_MAX: usize = 16;
    /// Maximum number of live render contexts (one per window).
    pub const RENDER_CONTEXT_COUNT_MAX: usize = WINDOW_COUNT_MAX;
}
