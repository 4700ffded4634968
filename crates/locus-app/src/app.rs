//! `LocusApp` trait definition.

use crate::context::AppContext;
use locus_platform::WindowHandle;
use locus_render::FrameToken;
use winit::event::WindowEvent;

/// Trait for Locus applications.
///
/// The framework opens the windows, creates a render context for each, and
/// drives one frame per window every tick. Surface rebuilds after resizes
/// and out-of-date swapchains happen before `render` is called.
pub trait LocusApp: Sized {
    /// Initialize the application.
    ///
    /// Called once, after every configured window has a render context.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state once per tick.
    ///
    /// # Arguments
    /// * `ctx` - Application context with GPU and window access
    /// * `dt` - Delta time in seconds since the last tick
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Record commands for one window's frame.
    ///
    /// A render pass clearing the acquired image is already open on
    /// `frame.command_buffer()`. The framework submits and presents once
    /// this returns, even if it returns an error.
    fn render(
        &mut self,
        ctx: &mut AppContext,
        window: WindowHandle,
        frame: &FrameToken,
    ) -> anyhow::Result<()>;

    /// Called after a window's surface chain was rebuilt for a new size.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_resize(
        &mut self,
        ctx: &mut AppContext,
        window: WindowHandle,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle a window event. Return `true` to stop the framework from
    /// processing it.
    ///
    /// Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, window: WindowHandle, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup before shutdown.
    ///
    /// The GPU is idle and every render context is still alive when this is
    /// called.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
