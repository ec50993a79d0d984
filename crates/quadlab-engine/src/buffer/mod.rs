//! Device buffers owned by RAII wrappers.
//!
//! Each wrapper borrows the device it was created on and releases its
//! handle exactly once when dropped.

mod index;
mod vertex;

pub use index::{Index, IndexBuffer};
pub use vertex::VertexBuffer;
