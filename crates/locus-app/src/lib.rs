//! Application framework for the Locus engine.
//!
//! This crate provides a trait-based application framework that handles:
//! - Logging initialization
//! - Window creation and close handling
//! - GPU context and render context creation, one per window
//! - Per-window frame begin/end and surface rebuilds
//! - Ordered shutdown of render contexts, device and windows
//!
//! # Example
//!
//! ```no_run
//! use locus_app::{run_app, AppConfig, AppContext, FrameToken, LocusApp, WindowHandle};
//!
//! struct MyApp;
//!
//! impl LocusApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn update(&mut self, _ctx: &AppContext, _dt: f32) {}
//!
//!     fn render(
//!         &mut self,
//!         _ctx: &mut AppContext,
//!         _window: WindowHandle,
//!         _frame: &FrameToken,
//!     ) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::new("My App"))
//! }
//! ```

mod app;
mod context;
mod runner;

pub use app::LocusApp;
pub use context::AppContext;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use ash::vk;
pub use locus_platform::WindowHandle;
pub use locus_render::{FrameToken, GraphicsManager, RenderContextHandle};
pub use winit::event::WindowEvent;
