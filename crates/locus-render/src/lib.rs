//! Render contexts and frame orchestration for the Locus engine.
//!
//! This crate provides:
//! - Per-window render contexts: surface, swapchain chain and frame ring
//! - The [`GraphicsManager`], which paces frames with per-slot fences and
//!   flushes deferred destruction once the GPU is done with a slot
//! - Surface rebuilds after resizes and out-of-date swapchains
//!
//! ```
//! use locus_render::{FrameConfig, GraphicsManager};
//! use locus_test::{MockBackend, MockWindow};
//!
//! let window = MockWindow::new(640, 480);
//! let mut graphics = GraphicsManager::new(MockBackend::new(), FrameConfig::default());
//! let context = graphics.create_render_context(&window)?;
//!
//! let frame = graphics.begin_frame(context)?;
//! assert_eq!(frame.extent().width, 640);
//! graphics.end_frame(frame)?;
//!
//! graphics.shutdown()?;
//! # Ok::<(), locus_gpu::GpuError>(())
//! ```

pub mod config;
pub mod frame;
pub mod manager;
pub mod render_context;

pub use config::FrameConfig;
pub use frame::{FrameResources, FrameToken};
pub use manager::GraphicsManager;
pub use render_context::{RenderContext, RenderContextHandle, SurfaceChain};
