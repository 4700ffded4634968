//! Application context.

use anyhow::anyhow;
use locus_gpu::VulkanBackend;
use locus_platform::{DisplayManager, WindowHandle};
use locus_render::{GraphicsManager, RenderContextHandle};
use std::time::Instant;

/// Application context shared across all app methods.
///
/// Field order is drop order: render contexts and the device go before the
/// windows their surfaces were created for.
pub struct AppContext {
    pub(crate) graphics: GraphicsManager<VulkanBackend>,
    pub(crate) display: DisplayManager,
    /// Render context presenting to each window.
    pub(crate) targets: Vec<(WindowHandle, RenderContextHandle)>,
    /// Ticks run so far.
    pub frame_count: u64,
    pub(crate) last_frame_time: Instant,
}

impl AppContext {
    pub(crate) fn new(graphics: GraphicsManager<VulkanBackend>, display: DisplayManager) -> Self {
        Self {
            graphics,
            display,
            targets: Vec::new(),
            frame_count: 0,
            last_frame_time: Instant::now(),
        }
    }

    /// The frame manager.
    pub const fn graphics(&self) -> &GraphicsManager<VulkanBackend> {
        &self.graphics
    }

    /// The frame manager, mutably.
    pub fn graphics_mut(&mut self) -> &mut GraphicsManager<VulkanBackend> {
        &mut self.graphics
    }

    /// Open windows.
    pub const fn display(&self) -> &DisplayManager {
        &self.display
    }

    /// Windows with a render context, in creation order.
    pub fn windows(&self) -> impl Iterator<Item = WindowHandle> + '_ {
        self.targets.iter().map(|&(window, _)| window)
    }

    /// Render context presenting to `window`.
    pub fn render_context(&self, window: WindowHandle) -> Option<RenderContextHandle> {
        self.targets
            .iter()
            .find(|&&(w, _)| w == window)
            .map(|&(_, context)| context)
    }

    /// Create a render context for `window`.
    pub(crate) fn attach(&mut self, window: WindowHandle) -> anyhow::Result<RenderContextHandle> {
        let managed = self
            .display
            .window(window)
            .ok_or_else(|| anyhow!("cannot attach invalid window {window}"))?;
        let context = self.graphics.create_render_context(managed)?;
        self.targets.push((window, context));
        Ok(context)
    }

    /// Destroy the render context presenting to `window`, if any.
    pub(crate) fn detach(&mut self, window: WindowHandle) -> anyhow::Result<()> {
        let Some(position) = self.targets.iter().position(|&(w, _)| w == window) else {
            return Ok(());
        };
        let (_, context) = self.targets.remove(position);
        self.graphics.destroy_render_context(context)?;
        Ok(())
    }
}
