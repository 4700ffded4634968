//! Application runner and event loop.

use std::thread;
use std::time::{Duration, Instant};

use locus_gpu::{GpuContextBuilder, GpuError, PresentWindow, VulkanBackend};
use locus_platform::{DisplayManager, WindowConfig, WindowHandle};
use locus_render::{FrameConfig, GraphicsManager, RenderContextHandle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::LocusApp;
use crate::context::AppContext;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Number of windows opened at startup.
    pub windows: usize,
    /// Target ticks per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Frames the CPU may record ahead of the GPU, per window.
    pub frames_in_flight: usize,
    /// Upper bound on frame fence waits.
    pub fence_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Locus Engine".to_string(),
            width: 1280,
            height: 720,
            windows: 1,
            target_fps: None,
            vsync: true,
            validation: cfg!(debug_assertions),
            frames_in_flight: locus_core::constants::FRAMES_IN_FLIGHT,
            fence_timeout: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of windows opened at startup.
    #[must_use]
    pub fn with_windows(mut self, windows: usize) -> Self {
        self.windows = windows;
        self
    }

    /// Set the target FPS.
    #[must_use]
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the number of frames in flight.
    #[must_use]
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Bound frame fence waits.
    #[must_use]
    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = Some(timeout);
        self
    }

    /// Frame manager settings derived from this config.
    pub fn frame_config(&self) -> FrameConfig {
        let mut config = FrameConfig::new()
            .with_frames_in_flight(self.frames_in_flight)
            .with_vsync(self.vsync);
        config.fence_timeout = self.fence_timeout;
        config
    }

    fn window_config(&self, index: usize) -> WindowConfig {
        let title = if self.windows > 1 {
            format!("{} [{}]", self.title, index + 1)
        } else {
            self.title.clone()
        };
        WindowConfig::new(title).with_size(self.width, self.height)
    }
}

/// Run a `LocusApp` with the given configuration.
///
/// Initializes logging, opens the windows, creates the GPU context and runs
/// the event loop until the main window closes. A GPU error that is not
/// recoverable ends the loop and is returned.
pub fn run_app<A: LocusApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        error: None,
    };
    event_loop.run_app(&mut runner)?;

    runner.error.map_or(Ok(()), Err)
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: LocusApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    /// Error that ended the event loop.
    error: Option<anyhow::Error>,
}

/// Internal application state.
struct AppState<A: LocusApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
    // FPS tracking
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: LocusApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        let Some(window) = state.ctx.display.find(id) else {
            return;
        };
        if state.app.on_event(window, &event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!(window = %window, "Close requested");
                state.ctx.display.mark_close_requested(window);
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = state.handle_resize(window, size.width, size.height) {
                    error!("Resize error: {e:#}");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut self.state else {
            return;
        };

        if let Err(e) = state.tick() {
            error!("Fatal render error: {e:#}");
            self.error = Some(e);
            event_loop.exit();
            return;
        }
        state.sweep_closed();

        if state.ctx.display.main_window().is_none() {
            info!("Main window closed");
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.cleanup();
        }
    }
}

impl<A: LocusApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let mut display = DisplayManager::new();
        for index in 0..self.config.windows.max(1) {
            display.create_window(event_loop, &self.config.window_config(index))?;
        }

        let gpu = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build()?;

        info!("GPU: {}", gpu.capabilities().summary());

        let graphics = GraphicsManager::new(VulkanBackend::new(gpu), self.config.frame_config());
        let mut ctx = AppContext::new(graphics, display);

        let windows: Vec<_> = ctx.display.windows().collect();
        for window in windows {
            ctx.attach(window)?;
        }

        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1))));

        Ok(AppState {
            ctx,
            app,
            target_frame_time,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        })
    }
}

impl<A: LocusApp> AppState<A> {
    /// Update once, then render one frame on every window.
    ///
    /// Errors that are not fatal are logged per window; the first fatal
    /// one stops the tick and is returned.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    fn tick(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();

        let dt = {
            let now = Instant::now();
            let dt = now.duration_since(self.ctx.last_frame_time).as_secs_f32();
            self.ctx.last_frame_time = now;

            if dt > 0.0 {
                let fps = 1.0 / f64::from(dt);
                self.min_fps = self.min_fps.min(fps);
                self.max_fps = self.max_fps.max(fps);
                self.fps_sum += fps;
            }
            dt
        };

        {
            #[cfg(feature = "profiling-tracy")]
            let _span = tracing::trace_span!("frame.update").entered();
            self.app.update(&self.ctx, dt);
        }

        let targets = self.ctx.targets.clone();
        for (window, context) in targets {
            if let Err(e) = self.render_window(window, context) {
                if is_fatal(&e) {
                    return Err(e.context(format!("rendering window {window}")));
                }
                error!(window = %window, "Render error: {e:#}");
            }
        }
        self.ctx.frame_count += 1;

        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }
        Ok(())
    }

    fn render_window(
        &mut self,
        window: WindowHandle,
        context: RenderContextHandle,
    ) -> anyhow::Result<()> {
        match self.ctx.display.framebuffer_size(window) {
            Some((width, height)) if width > 0 && height > 0 => {}
            _ => return Ok(()),
        }

        if self.ctx.graphics.needs_rebuild(context) {
            self.rebuild(window, context)?;
        }

        let frame = match self.ctx.graphics.begin_frame(context) {
            Ok(frame) => frame,
            Err(GpuError::SurfaceOutOfDate) => return self.rebuild(window, context),
            Err(e) => return Err(e.into()),
        };

        let rendered = self.app.render(&mut self.ctx, window, &frame);
        self.ctx.graphics.end_frame(frame)?;
        rendered
    }

    fn rebuild(&mut self, window: WindowHandle, context: RenderContextHandle) -> anyhow::Result<()> {
        let Some(managed) = self.ctx.display.window(window) else {
            return Ok(());
        };
        let (width, height) = managed.framebuffer_size();
        self.ctx.graphics.rebuild_surface_chain(context, managed)?;
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.app.on_resize(&mut self.ctx, window, width, height)
    }

    fn handle_resize(&mut self, window: WindowHandle, width: u32, height: u32) -> anyhow::Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let Some(context) = self.ctx.render_context(window) else {
            return Ok(());
        };

        self.rebuild(window, context)?;

        info!(window = %window, "Resized to {}x{}", width, height);
        Ok(())
    }

    /// Tear down render contexts of windows the user closed, then the windows.
    fn sweep_closed(&mut self) {
        let closing: Vec<_> = self.ctx.display.closing().collect();
        if closing.is_empty() {
            return;
        }

        for window in closing {
            if let Err(e) = self.ctx.detach(window) {
                error!(window = %window, "Failed to destroy render context: {e:#}");
            }
        }
        self.ctx.display.sweep_closed();
    }

    fn cleanup(&mut self) {
        if self.ctx.frame_count > 0 {
            #[allow(clippy::cast_precision_loss)]
            let avg_fps = self.fps_sum / self.ctx.frame_count as f64;
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
            info!("  Total frames: {}", self.ctx.frame_count);
        }

        info!("Starting cleanup...");
        if let Err(e) = self.ctx.graphics.backend().gpu().wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);

        if let Err(e) = self.ctx.graphics.shutdown() {
            error!("Graphics shutdown failed: {e}");
        }
        self.ctx.targets.clear();

        info!("Cleanup complete");
    }
}

/// Whether a frame error should end the application.
fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<GpuError>()
        .is_some_and(|e| !e.is_recoverable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn only_unrecoverable_gpu_errors_are_fatal() {
        let lost = anyhow::Error::from(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        assert!(is_fatal(&lost));
        assert!(is_fatal(&anyhow::Error::from(GpuError::ShuttingDown)));

        assert!(!is_fatal(&anyhow::Error::from(GpuError::Timeout)));
        assert!(!is_fatal(&anyhow::Error::from(GpuError::SurfaceOutOfDate)));
        assert!(!is_fatal(&anyhow::anyhow!("app failed to record")));
    }

    #[test]
    fn frame_config_follows_app_config() {
        let config = AppConfig::new("Test")
            .with_frames_in_flight(3)
            .with_vsync(false)
            .with_fence_timeout(Duration::from_secs(1))
            .frame_config();
        assert_eq!(config.frames_in_flight, 3);
        assert!(!config.vsync);
        assert_eq!(config.fence_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn window_titles_are_numbered() {
        let single = AppConfig::new("Editor");
        assert_eq!(single.window_config(0).title, "Editor");

        let double = AppConfig::new("Editor").with_windows(2).with_size(800, 600);
        let second = double.window_config(1);
        assert_eq!(second.title, "Editor [2]");
        assert_eq!((second.width, second.height), (800, 600));
    }
}
