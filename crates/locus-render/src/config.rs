//! Frame manager configuration.

use locus_core::constants::{FRAMES_IN_FLIGHT, RENDER_CONTEXT_COUNT_MAX};
use std::time::Duration;

/// Settings shared by every render context of a [`GraphicsManager`](crate::GraphicsManager).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Number of frame slots per render context. Must be at least 1.
    pub frames_in_flight: usize,
    /// Upper bound on the CPU wait for a slot's fence; `None` waits forever.
    pub fence_timeout: Option<Duration>,
    /// Upper bound on swapchain image acquisition; `None` waits forever.
    pub acquire_timeout: Option<Duration>,
    /// Color the frame's render pass clears to.
    pub clear_color: [f32; 4],
    /// Present with vertical sync.
    pub vsync: bool,
    /// Maximum number of live render contexts.
    pub max_render_contexts: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: FRAMES_IN_FLIGHT,
            fence_timeout: None,
            acquire_timeout: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
            max_render_contexts: RENDER_CONTEXT_COUNT_MAX,
        }
    }
}

impl FrameConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames in flight.
    #[must_use]
    pub const fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Bound fence waits.
    #[must_use]
    pub const fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = Some(timeout);
        self
    }

    /// Bound image acquisition.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Set the clear color.
    #[must_use]
    pub const fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub const fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the render context limit.
    #[must_use]
    pub const fn with_max_render_contexts(mut self, max: usize) -> Self {
        self.max_render_contexts = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_wait_forever() {
        let config = FrameConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.fence_timeout, None);
        assert_eq!(config.acquire_timeout, None);
        assert_eq!(config.max_render_contexts, RENDER_CONTEXT_COUNT_MAX);
    }

    #[test]
    fn builder_sets_fields() {
        let config = FrameConfig::new()
            .with_frames_in_flight(3)
            .with_fence_timeout(Duration::from_millis(250))
            .with_clear_color([1.0, 0.0, 0.0, 1.0])
            .with_vsync(false);
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.fence_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.clear_color, [1.0, 0.0, 0.0, 1.0]);
        assert!(!config.vsync);
    }
}
