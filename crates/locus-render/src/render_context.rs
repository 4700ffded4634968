//! Per-window render targets.

use crate::config::FrameConfig;
use crate::frame::FrameResources;
use ash::vk;
use locus_core::define_handle;
use locus_gpu::{
    DeletionQueue, GpuBackend, GpuObject, Owner, PresentWindow, ResourceArena, ResourceHandle,
    Result,
};

define_handle! {
    /// Handle to a render context owned by a [`GraphicsManager`](crate::GraphicsManager).
    pub struct RenderContextHandle;
}

/// Everything that depends on the surface's current size and format.
#[derive(Debug, Clone)]
pub struct SurfaceChain {
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) views: Vec<vk::ImageView>,
    pub(crate) framebuffers: Vec<vk::Framebuffer>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) format: vk::Format,
    pub(crate) extent: vk::Extent2D,
}

impl SurfaceChain {
    /// Build a swapchain on `surface` plus one view and framebuffer per image,
    /// all recorded under [`Owner::SurfaceChain`].
    ///
    /// On error the objects created so far stay in `arena`; the caller
    /// releases the owner.
    pub(crate) fn build<B: GpuBackend>(
        backend: &mut B,
        arena: &mut ResourceArena,
        context: u64,
        surface: (vk::SurfaceKHR, ResourceHandle),
        extent: vk::Extent2D,
        vsync: bool,
    ) -> Result<Self> {
        let owner = Owner::SurfaceChain(context);
        let (surface, surface_record) = surface;

        let info = backend.create_swapchain(surface, extent, vsync)?;
        let swapchain_record =
            arena.register(GpuObject::Swapchain(info.swapchain), owner, &[surface_record]);

        let render_pass = backend.create_render_pass(info.format)?;
        let render_pass_record = arena.register(GpuObject::RenderPass(render_pass), owner, &[]);

        let mut views = Vec::with_capacity(info.images.len());
        let mut framebuffers = Vec::with_capacity(info.images.len());
        for &image in &info.images {
            let view = backend.create_image_view(image, info.format)?;
            let view_record =
                arena.register(GpuObject::ImageView(view), owner, &[swapchain_record]);
            views.push(view);

            let framebuffer = backend.create_framebuffer(render_pass, view, info.extent)?;
            arena.register(
                GpuObject::Framebuffer(framebuffer),
                owner,
                &[view_record, render_pass_record],
            );
            framebuffers.push(framebuffer);
        }

        tracing::info!(
            "Swapchain created: {}x{} ({} images)",
            info.extent.width,
            info.extent.height,
            info.images.len()
        );

        Ok(Self {
            swapchain: info.swapchain,
            images: info.images,
            views,
            framebuffers,
            render_pass,
            format: info.format,
            extent: info.extent,
        })
    }

    /// Swapchain handle.
    pub const fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Presentable images.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per image.
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// Render pass compatible with the framebuffers.
    pub const fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Image format.
    pub const fn format(&self) -> vk::Format {
        self.format
    }

    /// Image extent.
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

/// A window's presentable surface, its image chain, and its frame ring.
pub struct RenderContext<B> {
    pub(crate) key: u64,
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_record: ResourceHandle,
    /// `None` after a failed rebuild, until the next successful one.
    pub(crate) chain: Option<SurfaceChain>,
    pub(crate) frames: Vec<FrameResources<B>>,
    pub(crate) frame_number: u64,
    pub(crate) needs_rebuild: bool,
    pub(crate) clear_color: [f32; 4],
    /// Flushed when the context is destroyed.
    pub(crate) deletion_queue: DeletionQueue<B>,
}

impl<B: GpuBackend> RenderContext<B> {
    /// Create the surface, the image chain and `config.frames_in_flight`
    /// frame slots for `window`.
    ///
    /// Objects are recorded in `arena` under owners keyed by `key`. On error
    /// they stay there; the caller releases them.
    pub(crate) fn create(
        backend: &mut B,
        arena: &mut ResourceArena,
        config: &FrameConfig,
        key: u64,
        window: &B::Window,
    ) -> Result<Self> {
        let surface = backend.create_surface(window)?;
        let surface_record = arena.register(GpuObject::Surface(surface), Owner::Context(key), &[]);

        let chain = SurfaceChain::build(
            backend,
            arena,
            key,
            (surface, surface_record),
            window_extent(window),
            config.vsync,
        )?;

        let frames = (0..config.frames_in_flight)
            .map(|slot| FrameResources::create(backend, arena, key, slot))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            key,
            surface,
            surface_record,
            chain: Some(chain),
            frames,
            frame_number: 0,
            needs_rebuild: false,
            clear_color: config.clear_color,
            deletion_queue: DeletionQueue::new(),
        })
    }

    /// Ring slot the next frame uses.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn current_slot(&self) -> usize {
        (self.frame_number % self.frames.len() as u64) as usize
    }

    /// Presentable surface.
    pub const fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Current image chain, if the last rebuild succeeded.
    pub const fn surface_chain(&self) -> Option<&SurfaceChain> {
        self.chain.as_ref()
    }

    /// Frame slots.
    pub fn frames(&self) -> &[FrameResources<B>] {
        &self.frames
    }

    /// Number of frames ended on this context.
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Whether the surface reported it no longer matches the image chain.
    pub const fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Color the frame's render pass clears to.
    pub const fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }
}

/// Framebuffer size of `window` as an extent, never zero-sized.
pub(crate) fn window_extent<W: PresentWindow + ?Sized>(window: &W) -> vk::Extent2D {
    let (width, height) = window.framebuffer_size();
    vk::Extent2D {
        width: width.max(1),
        height: height.max(1),
    }
}
