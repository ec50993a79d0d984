use std::sync::Arc;

use anyhow::Result;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::input::KeyEvent;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    /// Close the window; the runtime exits at the next loop iteration.
    Exit,
}

/// Application contract driven by [`Runtime`](super::Runtime).
pub trait App {
    /// Called once the window exists. An error stops the runtime.
    fn on_start(&mut self, window: Arc<Window>) -> Result<()>;

    fn on_key(&mut self, event: KeyEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called with the new framebuffer size.
    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        let _ = size;
    }

    /// Called once per loop iteration to render and present a frame.
    fn on_frame(&mut self, window: &Window) -> Result<AppControl>;

    /// Called once before the window is destroyed.
    fn on_exit(&mut self) {}
}
