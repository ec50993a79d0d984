//! Keyboard input.
//!
//! Public API is platform-agnostic and does not expose winit types.
//! The window runtime translates platform key events into [`KeyEvent`]s.

pub(crate) mod platform;
mod types;

pub use types::{Key, KeyAction, KeyEvent};
