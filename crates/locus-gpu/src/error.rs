//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// The surface changed (e.g. resized) and its image chain must be rebuilt.
    #[error("Surface is out of date")]
    SurfaceOutOfDate,

    /// A bounded wait on the GPU expired.
    #[error("Timed out waiting for the GPU")]
    Timeout,

    /// The graphics manager is tearing down and refuses new frames.
    #[error("Graphics manager is shutting down")]
    ShuttingDown,

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl GpuError {
    /// Whether the caller can recover without tearing down the device.
    ///
    /// An out-of-date surface is fixed by rebuilding the surface chain; a
    /// timeout may be retried. Everything else is fatal for the frame loop.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceOutOfDate | Self::Timeout)
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(GpuError::SurfaceOutOfDate.is_recoverable());
        assert!(GpuError::Timeout.is_recoverable());
        assert!(!GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST).is_recoverable());
        assert!(!GpuError::ShuttingDown.is_recoverable());
    }
}
