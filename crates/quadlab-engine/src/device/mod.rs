//! Graphics device layer.
//!
//! This module is responsible for:
//! - the handle-based [`Device`] contract that buffers and programs are built on
//! - typed object handles and device faults
//! - the error-checked call wrapper ([`checked!`](crate::checked))
//! - creating the wgpu Instance/Adapter/Device/Queue and the window surface
//! - [`WgpuDevice`], the wgpu implementation presenting to a window

mod check;
mod fault;
mod gpu;
mod handle;
mod surface;
mod traits;
mod wgpu_device;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use check::{check_and_report, CallSite, DeviceError};
pub use fault::{DeviceFault, FaultKind};
pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
pub use handle::{BufferId, ProgramId, ShaderId, UniformLocation};
pub use traits::{
    BufferKind, Device, ShaderStage, VertexAttribute, Viewport, INDEX_FORMAT, INDEX_STRIDE,
};
pub(crate) use traits::check_draw_range;
pub use wgpu_device::WgpuDevice;
