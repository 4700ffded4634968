//! Open windows, addressed by generational handles.

use crate::{Result, WindowConfig};
use locus_core::constants::WINDOW_COUNT_MAX;
use locus_core::{define_handle, CoreError, Pool};
use locus_gpu::{PresentWindow, VulkanWindow};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle as RawHandle,
};
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

define_handle! {
    /// Handle to a window owned by a [`DisplayManager`].
    pub struct WindowHandle;
}

/// A winit window plus its close state.
pub struct ManagedWindow {
    window: Arc<Window>,
    close_requested: bool,
}

impl ManagedWindow {
    /// The underlying winit window.
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Whether the user asked to close the window.
    pub const fn close_requested(&self) -> bool {
        self.close_requested
    }
}

impl PresentWindow for ManagedWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

impl HasWindowHandle for ManagedWindow {
    fn window_handle(&self) -> std::result::Result<RawHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for ManagedWindow {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl VulkanWindow for ManagedWindow {}

/// Owns every open window.
///
/// The first window created is the main window; once it is swept the
/// application is expected to exit.
pub struct DisplayManager {
    windows: Pool<ManagedWindow, WindowHandle>,
    main: Option<WindowHandle>,
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayManager {
    /// Create a manager with no windows, holding at most `WINDOW_COUNT_MAX`.
    pub fn new() -> Self {
        Self {
            windows: Pool::with_capacity(WINDOW_COUNT_MAX),
            main: None,
        }
    }

    /// Open a window.
    pub fn create_window(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: &WindowConfig,
    ) -> Result<WindowHandle> {
        if self.windows.is_full() {
            return Err(CoreError::CapacityExceeded {
                capacity: WINDOW_COUNT_MAX,
            }
            .into());
        }

        let attributes = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| crate::PlatformError::WindowCreation(e.to_string()))?;

        let handle = self.windows.create(ManagedWindow {
            window: Arc::new(window),
            close_requested: false,
        });
        if self.main.is_none() {
            self.main = Some(handle);
        }

        tracing::info!(window = %handle, title = %config.title, "Window created");
        Ok(handle)
    }

    /// Close a window immediately. Returns `false` for a stale handle.
    pub fn destroy_window(&mut self, handle: WindowHandle) -> bool {
        if !self.windows.destroy(handle) {
            return false;
        }
        if self.main == Some(handle) {
            self.main = None;
        }
        tracing::info!(window = %handle, "Window destroyed");
        true
    }

    /// Look up a window.
    pub fn window(&self, handle: WindowHandle) -> Option<&ManagedWindow> {
        self.windows.try_get(handle)
    }

    /// Framebuffer size of a window in physical pixels.
    pub fn framebuffer_size(&self, handle: WindowHandle) -> Option<(u32, u32)> {
        self.window(handle).map(PresentWindow::framebuffer_size)
    }

    /// Handle of the window winit knows as `id`.
    pub fn find(&self, id: WindowId) -> Option<WindowHandle> {
        self.windows
            .iter()
            .find(|(_, managed)| managed.window.id() == id)
            .map(|(handle, _)| handle)
    }

    /// Flag a window for removal by the next [`sweep_closed`](Self::sweep_closed).
    pub fn mark_close_requested(&mut self, handle: WindowHandle) {
        match self.windows.try_get_mut(handle) {
            Some(managed) => managed.close_requested = true,
            None => tracing::warn!(window = %handle, "Close requested for an invalid window"),
        }
    }

    /// Windows flagged for removal.
    pub fn closing(&self) -> impl Iterator<Item = WindowHandle> + '_ {
        self.windows
            .iter()
            .filter(|(_, managed)| managed.close_requested)
            .map(|(handle, _)| handle)
    }

    /// Destroy every window flagged for removal and return their handles.
    ///
    /// Anything presenting to those windows must be torn down first.
    pub fn sweep_closed(&mut self) -> Vec<WindowHandle> {
        let closed: Vec<_> = self.closing().collect();
        for &handle in &closed {
            self.destroy_window(handle);
        }
        closed
    }

    /// The first window opened, while it stays open.
    pub const fn main_window(&self) -> Option<WindowHandle> {
        self.main
    }

    /// Handles of every open window.
    pub fn windows(&self) -> impl Iterator<Item = WindowHandle> + '_ {
        self.windows.handles()
    }

    /// Number of open windows.
    pub const fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no window is open.
    pub const fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manager() {
        let mut display = DisplayManager::new();
        assert!(display.is_empty());
        assert_eq!(display.main_window(), None);
        assert!(display.sweep_closed().is_empty());
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut display = DisplayManager::new();
        let handle = WindowHandle::INVALID;
        assert!(display.window(handle).is_none());
        assert_eq!(display.framebuffer_size(handle), None);
        assert!(!display.destroy_window(handle));
        display.mark_close_requested(handle);
        assert_eq!(display.closing().count(), 0);
    }
}
