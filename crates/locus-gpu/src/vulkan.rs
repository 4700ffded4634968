//! [`GpuBackend`] over a real Vulkan device.

use crate::backend::{
    AcquiredImage, FrameSubmit, GpuBackend, GpuObject, RenderPassBegin, SwapchainInfo,
};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::surface::{SurfaceCapabilities, VulkanWindow};
use crate::swapchain::calculate_extent;
use crate::{command, surface, swapchain, sync};
use ash::vk;
use std::time::Duration;

/// Vulkan implementation of the frame manager's device boundary.
///
/// The trait methods are safe to call; the backend relies on the frame
/// manager never destroying an object the GPU may still be reading.
pub struct VulkanBackend {
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    gpu: GpuContext,
}

impl VulkanBackend {
    /// Wrap a GPU context.
    pub fn new(gpu: GpuContext) -> Self {
        let surface_loader = ash::khr::surface::Instance::new(gpu.entry(), gpu.instance());
        let swapchain_loader = ash::khr::swapchain::Device::new(gpu.instance(), gpu.device());
        Self {
            surface_loader,
            swapchain_loader,
            gpu,
        }
    }

    /// The underlying GPU context.
    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Surface capabilities of `surface` on the selected device.
    pub fn surface_capabilities(&self, surface: vk::SurfaceKHR) -> Result<SurfaceCapabilities> {
        unsafe {
            SurfaceCapabilities::query(&self.surface_loader, self.gpu.physical_device(), surface)
        }
    }
}

impl GpuBackend for VulkanBackend {
    type Window = dyn VulkanWindow;

    fn create_surface(&mut self, window: &Self::Window) -> Result<vk::SurfaceKHR> {
        let surface =
            unsafe { surface::create_surface(self.gpu.entry(), self.gpu.instance(), window)? };

        let supported = unsafe {
            self.surface_loader.get_physical_device_surface_support(
                self.gpu.physical_device(),
                self.gpu.graphics_queue_family(),
                surface,
            )
        };
        match supported {
            Ok(true) => Ok(surface),
            Ok(false) => {
                unsafe { self.surface_loader.destroy_surface(surface, None) };
                Err(GpuError::SurfaceCreation(
                    "graphics queue cannot present to this surface".into(),
                ))
            }
            Err(e) => {
                unsafe { self.surface_loader.destroy_surface(surface, None) };
                Err(e.into())
            }
        }
    }

    fn create_swapchain(
        &mut self,
        surface: vk::SurfaceKHR,
        extent: vk::Extent2D,
        vsync: bool,
    ) -> Result<SwapchainInfo> {
        let caps = self.surface_capabilities(surface)?;
        let format = caps.recommended_format()?;
        let present_mode = caps.recommended_present_mode(vsync);
        let extent = calculate_extent(&caps.capabilities, extent.width, extent.height);

        let info = unsafe {
            swapchain::create_swapchain(
                &self.swapchain_loader,
                surface,
                &caps.capabilities,
                format,
                present_mode,
                extent,
                self.gpu.graphics_queue_family(),
            )?
        };
        tracing::debug!(
            ?present_mode,
            format = ?info.format,
            images = info.images.len(),
            "Created swapchain"
        );
        Ok(info)
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
        unsafe { swapchain::create_image_view(self.gpu.device(), image, format) }
    }

    fn create_render_pass(&mut self, format: vk::Format) -> Result<vk::RenderPass> {
        unsafe { swapchain::create_present_render_pass(self.gpu.device(), format) }
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        unsafe { swapchain::create_framebuffer(self.gpu.device(), render_pass, view, extent) }
    }

    fn create_command_pool(&mut self) -> Result<vk::CommandPool> {
        unsafe { command::create_command_pool(self.gpu.device(), self.gpu.graphics_queue_family()) }
    }

    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        unsafe { command::allocate_command_buffer(self.gpu.device(), pool) }
    }

    fn create_semaphore(&mut self) -> Result<vk::Semaphore> {
        unsafe { sync::create_semaphore(self.gpu.device()) }
    }

    fn create_fence(&mut self, signaled: bool) -> Result<vk::Fence> {
        unsafe { sync::create_fence(self.gpu.device(), signaled) }
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout: Option<Duration>) -> Result<()> {
        unsafe { sync::wait_for_fence(self.gpu.device(), fence, timeout) }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        unsafe { sync::reset_fence(self.gpu.device(), fence) }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout: Option<Duration>,
    ) -> Result<AcquiredImage> {
        unsafe { swapchain::acquire_next_image(&self.swapchain_loader, swapchain, signal, timeout) }
    }

    fn begin_commands(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { command::begin_command_buffer(self.gpu.device(), cmd) }
    }

    fn begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        unsafe { command::cmd_begin_render_pass(self.gpu.device(), cmd, begin) };
    }

    fn end_render_pass(&mut self, cmd: vk::CommandBuffer) {
        unsafe { self.gpu.device().cmd_end_render_pass(cmd) };
    }

    fn end_commands(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { command::end_command_buffer(self.gpu.device(), cmd) }
    }

    fn submit(&mut self, submit: &FrameSubmit) -> Result<()> {
        unsafe {
            command::submit_command_buffers(
                self.gpu.device(),
                self.gpu.graphics_queue(),
                &[submit.command_buffer],
                &[submit.wait],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[submit.signal],
                submit.fence,
            )
        }
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<bool> {
        unsafe {
            swapchain::present(
                &self.swapchain_loader,
                self.gpu.graphics_queue(),
                swapchain,
                image_index,
                &[wait],
            )
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.gpu.wait_idle()
    }

    fn destroy(&mut self, object: GpuObject) {
        let device = self.gpu.device();
        unsafe {
            match object {
                GpuObject::Surface(surface) => self.surface_loader.destroy_surface(surface, None),
                GpuObject::Swapchain(swapchain) => {
                    self.swapchain_loader.destroy_swapchain(swapchain, None);
                }
                GpuObject::ImageView(view) => device.destroy_image_view(view, None),
                GpuObject::RenderPass(render_pass) => device.destroy_render_pass(render_pass, None),
                GpuObject::Framebuffer(framebuffer) => {
                    device.destroy_framebuffer(framebuffer, None);
                }
                GpuObject::CommandPool(pool) => device.destroy_command_pool(pool, None),
                GpuObject::Semaphore(semaphore) => device.destroy_semaphore(semaphore, None),
                GpuObject::Fence(fence) => device.destroy_fence(fence, None),
                GpuObject::Pipeline(pipeline) => device.destroy_pipeline(pipeline, None),
                GpuObject::PipelineLayout(layout) => device.destroy_pipeline_layout(layout, None),
            }
        }
        tracing::trace!(?object, "Destroyed GPU object");
    }
}
