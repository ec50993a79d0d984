use std::fmt;

use crate::checked;
use crate::device::{BufferId, BufferKind, Device, DeviceError};

/// Vertex data uploaded once to a device buffer.
pub struct VertexBuffer<'d, D: Device> {
    device: &'d D,
    id: BufferId,
    size: usize,
}

impl<'d, D: Device> VertexBuffer<'d, D> {
    /// Uploads `data` as static vertex content and binds the new buffer.
    pub fn new<T: bytemuck::Pod>(device: &'d D, data: &[T]) -> Result<Self, DeviceError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let id = checked!(device, device.create_buffer(BufferKind::Vertex, bytes))?;

        // Owned from here on so a failing bind still releases the handle.
        let buffer = Self {
            device,
            id,
            size: bytes.len(),
        };
        buffer.bind()?;
        Ok(buffer)
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Size of the uploaded data in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bind(&self) -> Result<(), DeviceError> {
        checked!(
            self.device,
            self.device.bind_buffer(BufferKind::Vertex, Some(self.id))
        )
    }

    pub fn unbind(&self) -> Result<(), DeviceError> {
        checked!(self.device, self.device.bind_buffer(BufferKind::Vertex, None))
    }
}

impl<D: Device> fmt::Debug for VertexBuffer<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

impl<D: Device> Drop for VertexBuffer<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = checked!(self.device, self.device.delete_buffer(self.id)) {
            log::error!("failed to release vertex buffer: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{Call, MockDevice};

    const QUAD: [f32; 8] = [-0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, 0.5];

    #[test]
    fn upload_records_byte_size_and_binds() {
        let device = MockDevice::new();
        let buffer = VertexBuffer::new(&device, &QUAD).unwrap();

        assert_eq!(buffer.size(), 32);
        assert_eq!(device.bound_buffer(BufferKind::Vertex), Some(buffer.id()));
        assert_eq!(
            device.buffer_contents(buffer.id()).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&QUAD)
        );
    }

    #[test]
    fn drop_releases_exactly_once() {
        let device = MockDevice::new();
        let id = VertexBuffer::new(&device, &QUAD).unwrap().id();

        assert_eq!(device.release_count(id), 1);
        assert!(!device.buffer_exists(id));
        assert_eq!(device.bound_buffer(BufferKind::Vertex), None);
    }

    #[test]
    fn unbind_clears_the_vertex_binding() {
        let device = MockDevice::new();
        let buffer = VertexBuffer::new(&device, &QUAD).unwrap();

        buffer.unbind().unwrap();
        assert_eq!(device.bound_buffer(BufferKind::Vertex), None);

        buffer.bind().unwrap();
        assert_eq!(device.bound_buffer(BufferKind::Vertex), Some(buffer.id()));
    }

    #[test]
    fn second_buffer_replaces_the_binding() {
        let device = MockDevice::new();
        let first = VertexBuffer::new(&device, &QUAD).unwrap();
        let second = VertexBuffer::new(&device, &QUAD[..4]).unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(device.bound_buffer(BufferKind::Vertex), Some(second.id()));
    }

    #[test]
    fn stale_fault_does_not_fail_creation() {
        let device = MockDevice::new();
        device.inject_fault(crate::device::DeviceFault::invalid_operation("earlier call"));

        let buffer = VertexBuffer::new(&device, &QUAD).unwrap();

        assert!(matches!(
            device.calls()[0],
            Call::CreateBuffer {
                kind: BufferKind::Vertex,
                len: 32,
                ..
            }
        ));
        assert_eq!(device.bound_buffer(BufferKind::Vertex), Some(buffer.id()));
    }
}
