//! quadlab engine crate.
//!
//! Owns the platform + GPU pieces the sandbox is built from: the graphics
//! device contract and its wgpu implementation, buffer and shader wrappers,
//! keyboard input and the window runtime.

pub mod buffer;
pub mod device;
pub mod input;
pub mod logging;
pub mod shader;
pub mod window;
