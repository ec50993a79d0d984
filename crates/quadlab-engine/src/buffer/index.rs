use std::fmt;

use crate::checked;
use crate::device::{BufferId, BufferKind, Device, DeviceError, INDEX_STRIDE};

/// Element type of index buffers, matching the device's index format.
pub type Index = u32;

const _: () = assert!(std::mem::size_of::<Index>() == INDEX_STRIDE);

/// Triangle indices uploaded once to a device buffer.
pub struct IndexBuffer<'d, D: Device> {
    device: &'d D,
    id: BufferId,
    count: usize,
}

impl<'d, D: Device> IndexBuffer<'d, D> {
    /// Uploads `indices` as static content and binds the new buffer.
    pub fn new(device: &'d D, indices: &[Index]) -> Result<Self, DeviceError> {
        let id = checked!(
            device,
            device.create_buffer(BufferKind::Index, bytemuck::cast_slice(indices))
        )?;

        let buffer = Self {
            device,
            id,
            count: indices.len(),
        };
        buffer.bind()?;
        Ok(buffer)
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Number of indices, as passed to an indexed draw.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn bind(&self) -> Result<(), DeviceError> {
        checked!(
            self.device,
            self.device.bind_buffer(BufferKind::Index, Some(self.id))
        )
    }

    pub fn unbind(&self) -> Result<(), DeviceError> {
        checked!(self.device, self.device.bind_buffer(BufferKind::Index, None))
    }
}

impl<D: Device> fmt::Debug for IndexBuffer<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("id", &self.id)
            .field("count", &self.count)
            .finish()
    }
}

impl<D: Device> Drop for IndexBuffer<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = checked!(self.device, self.device.delete_buffer(self.id)) {
            log::error!("failed to release index buffer: {e}");
        }
    }
}
