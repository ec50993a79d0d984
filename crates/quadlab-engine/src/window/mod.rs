//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the single application window, and drives
//! an [`App`] through it.

mod app;
mod runtime;

pub use app::{App, AppControl};
pub use runtime::{Runtime, RuntimeConfig};
