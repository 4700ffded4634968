//! The boundary between the frame manager and the graphics device.
//!
//! The render core never calls Vulkan directly; it drives a [`GpuBackend`].
//! [`VulkanBackend`](crate::VulkanBackend) implements it over a real device,
//! and tests implement it with a deterministic fake.

use crate::error::Result;
use ash::vk;
use std::time::Duration;

/// A window that can host a presentable surface.
pub trait PresentWindow {
    /// Current framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

/// Destroyable GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuObject {
    /// Presentable surface.
    Surface(vk::SurfaceKHR),
    /// Swapchain (owns its images).
    Swapchain(vk::SwapchainKHR),
    /// Image view.
    ImageView(vk::ImageView),
    /// Render pass.
    RenderPass(vk::RenderPass),
    /// Framebuffer.
    Framebuffer(vk::Framebuffer),
    /// Command pool (frees its command buffers).
    CommandPool(vk::CommandPool),
    /// Binary semaphore.
    Semaphore(vk::Semaphore),
    /// Fence.
    Fence(vk::Fence),
    /// Pipeline.
    Pipeline(vk::Pipeline),
    /// Pipeline layout.
    PipelineLayout(vk::PipelineLayout),
}

/// A freshly created swapchain.
#[derive(Debug, Clone)]
pub struct SwapchainInfo {
    /// Swapchain handle.
    pub swapchain: vk::SwapchainKHR,
    /// Presentable images, owned by the swapchain.
    pub images: Vec<vk::Image>,
    /// Image format.
    pub format: vk::Format,
    /// Image extent.
    pub extent: vk::Extent2D,
}

/// Result of a successful image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index into the swapchain's images.
    pub index: u32,
    /// The surface still works but no longer matches the swapchain exactly.
    pub suboptimal: bool,
}

/// Parameters for starting the frame's render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBegin {
    /// Render pass.
    pub render_pass: vk::RenderPass,
    /// Framebuffer wrapping the acquired image.
    pub framebuffer: vk::Framebuffer,
    /// Render area.
    pub extent: vk::Extent2D,
    /// Clear color for the color attachment.
    pub clear_color: [f32; 4],
}

/// One frame's queue submission.
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmit {
    /// Recorded command buffer.
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by acquisition; drawing waits on it.
    pub wait: vk::Semaphore,
    /// Signaled when drawing finishes; presentation waits on it.
    pub signal: vk::Semaphore,
    /// Signaled when the GPU completes the submission.
    pub fence: vk::Fence,
}

/// Graphics device operations required by the frame manager.
///
/// A `None` timeout means wait forever. Bounded waits that expire return
/// [`GpuError::Timeout`](crate::GpuError::Timeout); image acquisition on a
/// stale surface returns
/// [`GpuError::SurfaceOutOfDate`](crate::GpuError::SurfaceOutOfDate).
pub trait GpuBackend {
    /// Window type surfaces are created from.
    type Window: PresentWindow + ?Sized;

    /// Create a presentable surface for `window`.
    fn create_surface(&mut self, window: &Self::Window) -> Result<vk::SurfaceKHR>;

    /// Create a swapchain on `surface`, clamping `extent` to what the surface allows.
    fn create_swapchain(
        &mut self,
        surface: vk::SurfaceKHR,
        extent: vk::Extent2D,
        vsync: bool,
    ) -> Result<SwapchainInfo>;

    /// Create a 2D color view of a swapchain image.
    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView>;

    /// Create a single-subpass render pass that clears and presents.
    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass>;

    /// Create a framebuffer for one image view.
    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;

    /// Create a resettable command pool on the graphics queue family.
    fn create_command_pool(&mut self) -> Result<vk::CommandPool>;

    /// Allocate a primary command buffer from `pool`.
    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> Result<vk::CommandBuffer>;

    /// Create a binary semaphore.
    fn create_semaphore(&mut self) -> Result<vk::Semaphore>;

    /// Create a fence, optionally already signaled.
    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence>;

    /// Block until `fence` is signaled.
    fn wait_for_fence(&mut self, fence: vk::Fence, timeout: Option<Duration>) -> Result<()>;

    /// Return `fence` to the unsignaled state.
    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()>;

    /// Acquire the next presentable image, signaling `signal` when it is ready.
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout: Option<Duration>,
    ) -> Result<AcquiredImage>;

    /// Reset `cmd` and begin one-time-submit recording.
    fn begin_commands(&mut self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Begin a render pass on `cmd`.
    fn begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin);

    /// End the current render pass on `cmd`.
    fn end_render_pass(&mut self, cmd: vk::CommandBuffer);

    /// Finish recording `cmd`.
    fn end_commands(&mut self, cmd: vk::CommandBuffer) -> Result<()>;

    /// Submit a recorded frame to the graphics queue.
    fn submit(&mut self, submit: &FrameSubmit) -> Result<()>;

    /// Present `image_index` once `wait` is signaled.
    ///
    /// Returns `true` if the surface should be rebuilt.
    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<bool>;

    /// Block until the device has no pending work.
    fn wait_idle(&mut self) -> Result<()>;

    /// Destroy an object. The GPU must no longer be using it.
    fn destroy(&mut self, object: GpuObject);
}
