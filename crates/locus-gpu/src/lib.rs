//! Vulkan abstraction layer for the Locus engine.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - The [`GpuBackend`] boundary the frame manager drives, with a Vulkan
//!   implementation ([`VulkanBackend`])
//! - Deferred destruction ([`DeletionQueue`])
//! - Ownership-tagged GPU object tracking ([`ResourceArena`])
//! - Swapchain, command buffer and synchronization helpers

pub mod arena;
pub mod backend;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod deletion;
pub mod error;
pub mod instance;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

pub use arena::{Owner, ResourceArena, ResourceHandle};
pub use backend::{
    AcquiredImage, FrameSubmit, GpuBackend, GpuObject, PresentWindow, RenderPassBegin,
    SwapchainInfo,
};
pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder};
pub use deletion::{DeletionBatch, DeletionQueue};
pub use error::{GpuError, Result};
pub use surface::{SurfaceCapabilities, VulkanWindow};
pub use vulkan::VulkanBackend;
