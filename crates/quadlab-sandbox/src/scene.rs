//! The quad, its shader program and the per-frame draw.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use quadlab_engine::buffer::{Index, IndexBuffer, VertexBuffer};
use quadlab_engine::checked;
use quadlab_engine::device::{Device, DeviceError, UniformLocation, VertexAttribute, Viewport};
use quadlab_engine::shader::{link_program, Program, ShaderSources};

use crate::pulse::Pulse;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
}

const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-0.5, -0.5] },
    Vertex { position: [0.5, -0.5] },
    Vertex { position: [0.5, 0.5] },
    Vertex { position: [-0.5, 0.5] },
];

const QUAD_INDICES: [Index; 6] = [0, 1, 2, 2, 3, 0];

/// Uniform block member the fragment stage reads its color from.
pub const COLOR_UNIFORM: &str = "u_Color";

/// Color uploaded right after linking, before the first frame.
pub const INITIAL_COLOR: [f32; 4] = [0.3, 0.5, 1.0, 1.0];

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Device resources for one quad plus the animation state.
pub struct Scene<'d, D: Device> {
    device: &'d D,

    // Kept alive for the draw; bound once at load.
    _vertices: VertexBuffer<'d, D>,
    indices: IndexBuffer<'d, D>,
    index_count: u32,

    program: Program<'d, D>,
    color: UniformLocation,
    pulse: Pulse,
}

impl<'d, D: Device> Scene<'d, D> {
    /// Uploads the quad, builds the program from `sources` and binds
    /// everything the per-frame draw relies on.
    pub fn load(device: &'d D, sources: &ShaderSources, pulse_step: f32) -> Result<Self> {
        let vertices =
            VertexBuffer::new(device, &QUAD_VERTICES).context("failed to upload quad vertices")?;

        checked!(
            device,
            device.vertex_attribute(VertexAttribute {
                location: 0,
                components: 2,
                stride: std::mem::size_of::<Vertex>() as u64,
                offset: 0,
            })
        )?;

        let indices =
            IndexBuffer::new(device, &QUAD_INDICES).context("failed to upload quad indices")?;
        let index_count = u32::try_from(indices.count()).context("index count exceeds u32")?;

        let program = link_program(device, sources).context("failed to build the quad program")?;
        program.bind()?;

        let color = program.uniform_location(COLOR_UNIFORM)?;
        program.set_uniform_4f(color, INITIAL_COLOR)?;

        log::info!("scene loaded: {} indices, program {:?}", index_count, program.id());

        Ok(Self {
            device,
            _vertices: vertices,
            indices,
            index_count,
            program,
            color,
            pulse: Pulse::new(pulse_step),
        })
    }

    pub fn pulse(&self) -> &Pulse {
        &self.pulse
    }

    /// Renders and presents one frame covering `viewport`.
    pub fn draw_frame(&mut self, viewport: Viewport) -> Result<(), DeviceError> {
        let device = self.device;

        checked!(device, device.set_viewport(viewport))?;
        checked!(device, device.clear(CLEAR_COLOR))?;

        self.program
            .set_uniform_4f(self.color, [self.pulse.value(), 0.5, 0.5, 1.0])?;
        self.pulse.advance();

        debug_assert_eq!(self.indices.count(), self.index_count as usize);
        checked!(device, device.draw_indexed(self.index_count))?;
        checked!(device, device.present())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadlab_engine::device::mock::{Call, MockDevice};
    use quadlab_engine::device::BufferKind;

    use crate::config::SandboxConfig;

    fn shipped_sources() -> ShaderSources {
        ShaderSources::read(SandboxConfig::default().shader_path).unwrap()
    }

    #[test]
    fn shipped_asset_splits_into_two_stages() {
        let sources = shipped_sources();
        assert!(sources.vertex.contains("gl_Position"));
        assert!(!sources.vertex.contains("#shader"));
        assert!(sources.fragment.contains(COLOR_UNIFORM));
        assert!(!sources.fragment.contains("#shader"));
    }

    #[test]
    fn load_binds_quad_and_program() {
        let device = MockDevice::new();
        let scene = Scene::load(&device, &shipped_sources(), 0.01).unwrap();

        assert_eq!(scene.index_count, 6);
        assert!(device.bound_buffer(BufferKind::Vertex).is_some());
        assert!(device.bound_buffer(BufferKind::Index).is_some());
        assert_eq!(device.current_program(), Some(scene.program.id()));
        assert_eq!(
            device.attributes(),
            vec![VertexAttribute {
                location: 0,
                components: 2,
                stride: 8,
                offset: 0
            }]
        );
        assert!(device.calls().contains(&Call::Uniform4f {
            location: scene.color,
            value: INITIAL_COLOR
        }));
    }

    #[test]
    fn frame_runs_viewport_clear_uniform_draw_present() {
        let device = MockDevice::new();
        let mut scene = Scene::load(&device, &shipped_sources(), 0.01).unwrap();
        device.reset_calls();

        let viewport = Viewport::from_size(640, 480);
        scene.draw_frame(viewport).unwrap();

        assert_eq!(
            device.calls(),
            vec![
                Call::SetViewport(viewport),
                Call::Clear(CLEAR_COLOR),
                Call::Uniform4f {
                    location: scene.color,
                    value: [Pulse::INITIAL, 0.5, 0.5, 1.0]
                },
                Call::DrawIndexed { count: 6 },
                Call::Present,
            ]
        );
    }

    #[test]
    fn pulse_advances_once_per_frame() {
        let device = MockDevice::new();
        let mut scene = Scene::load(&device, &shipped_sources(), 0.01).unwrap();

        for _ in 0..3 {
            scene.draw_frame(Viewport::from_size(640, 480)).unwrap();
        }

        assert!((scene.pulse().angle() - 0.03).abs() < 1e-6);
        assert!((scene.pulse().value() - 0.03f32.sin()).abs() < 1e-6);
    }

    #[test]
    fn missing_shader_asset_fails_to_load() {
        let device = MockDevice::new();
        let sources = ShaderSources::load("does/not/exist.shader");

        assert!(Scene::load(&device, &sources, 0.01).is_err());
        // Buffers uploaded before the failure are released.
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn dropping_the_scene_releases_everything() {
        let device = MockDevice::new();
        drop(Scene::load(&device, &shipped_sources(), 0.01).unwrap());

        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.live_programs(), 0);
    }
}
