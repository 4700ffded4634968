//! Editor application state.

use locus_app::{AppContext, FrameToken, LocusApp, WindowHandle};
use tracing::info;

/// Clear colors, one per window in creation order.
const PALETTE: [[f32; 4]; 2] = [[0.05, 0.07, 0.12, 1.0], [0.16, 0.12, 0.10, 1.0]];

const REPORT_INTERVAL: f32 = 1.0;

pub struct Editor {
    elapsed: f32,
    ticks: u32,
    frames: u64,
}

impl LocusApp for Editor {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let windows: Vec<_> = ctx.windows().collect();
        for (window, color) in windows.into_iter().zip(PALETTE.iter().cycle()) {
            if let Some(context) = ctx.render_context(window) {
                ctx.graphics_mut().set_clear_color(context, *color);
            }
        }

        info!(
            windows = ctx.display().len(),
            frames_in_flight = ctx.graphics().frames_in_flight(),
            "Editor initialized"
        );

        Ok(Self {
            elapsed: 0.0,
            ticks: 0,
            frames: 0,
        })
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) {
        self.elapsed += dt;
        self.ticks += 1;

        if self.elapsed >= REPORT_INTERVAL {
            #[allow(clippy::cast_precision_loss)]
            let frame_ms = self.elapsed * 1000.0 / self.ticks as f32;
            info!(
                frames = self.frames,
                "Frame time: {frame_ms:.2} ms ({:.0} fps)",
                1000.0 / frame_ms
            );
            self.elapsed = 0.0;
            self.ticks = 0;
        }
    }

    fn render(
        &mut self,
        _ctx: &mut AppContext,
        _window: WindowHandle,
        _frame: &FrameToken,
    ) -> anyhow::Result<()> {
        // The open render pass already clears to the window's color.
        self.frames += 1;
        Ok(())
    }

    fn on_resize(
        &mut self,
        _ctx: &mut AppContext,
        window: WindowHandle,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        info!(window = %window, "Viewport {width}x{height}");
        Ok(())
    }
}
