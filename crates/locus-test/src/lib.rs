//! Test harness for the Locus engine.
//!
//! Provides a deterministic stand-in for the GPU so frame orchestration can
//! be tested without a device or a display. [`MockBackend`] fabricates object
//! handles, simulates fence completion, and records every interaction in an
//! [`EventLog`] that tests inspect for temporal ordering.

pub mod events;
pub mod mock;
pub mod window;

pub use events::{EventLog, GpuEvent};
pub use mock::MockBackend;
pub use window::MockWindow;
