//! Platform abstraction for the Locus engine.
//!
//! Provides window creation and lifetime tracking via winit.

pub mod display;

pub use display::{DisplayManager, ManagedWindow, WindowHandle};

use locus_core::CoreError;
use thiserror::Error;

/// Platform layer errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The OS refused to create a window.
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    /// The event loop could not be created or run.
    #[error("Event loop error: {0}")]
    EventLoop(String),
    /// Window bookkeeping failed, e.g. too many windows.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Window configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Title bar text.
    pub title: String,
    /// Initial inner width in physical pixels.
    pub width: u32,
    /// Initial inner height in physical pixels.
    pub height: u32,
    /// Whether the user may resize the window.
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Locus Engine".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create a config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the initial inner size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Allow or forbid user resizing.
    #[must_use]
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = WindowConfig::new("Tools").with_size(640, 480).with_resizable(false);
        assert_eq!(config.title, "Tools");
        assert_eq!((config.width, config.height), (640, 480));
        assert!(!config.resizable);
    }

    #[test]
    fn capacity_error_converts() {
        let err: PlatformError = CoreError::CapacityExceeded { capacity: 16 }.into();
        assert!(matches!(err, PlatformError::Core(_)));
        assert_eq!(err.to_string(), "Pool capacity exceeded (16 slots)");
    }
}
