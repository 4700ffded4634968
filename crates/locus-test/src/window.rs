//! Window stand-in for headless tests.

use locus_gpu::PresentWindow;
use std::cell::Cell;

/// A window that only knows its framebuffer size.
#[derive(Debug)]
pub struct MockWindow {
    size: Cell<(u32, u32)>,
}

impl MockWindow {
    /// Create a window with the given framebuffer size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            size: Cell::new((width, height)),
        }
    }

    /// Simulate a resize (or minimize, with a zero dimension).
    pub fn resize(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }
}

impl Default for MockWindow {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl PresentWindow for MockWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.size.get()
    }
}
