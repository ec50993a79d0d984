use std::fmt;

use wgpu::naga;

use super::{BufferId, DeviceFault, ProgramId, ShaderId, UniformLocation};

/// Binding point of a buffer object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Vertex,
    /// Element indices for indexed draws.
    Index,
}

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Layout of one float vertex attribute read from the bound vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Number of `f32` components, 1 to 4.
    pub components: u8,
    /// Distance in bytes between consecutive vertices.
    pub stride: u64,
    /// Byte offset of the attribute inside a vertex.
    pub offset: u64,
}

/// Pixel rectangle that normalized device coordinates map onto.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Full-surface viewport for a framebuffer of the given size.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Format of every index buffer read by an indexed draw.
pub const INDEX_FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint32;

/// Bytes per index under [`INDEX_FORMAT`].
pub const INDEX_STRIDE: usize = match INDEX_FORMAT {
    wgpu::IndexFormat::Uint16 => 2,
    wgpu::IndexFormat::Uint32 => 4,
};

/// Checks an indexed draw of `count` against the bound buffer sizes.
///
/// `vertex_bytes` is `None` when the draw reads no vertex buffer. Returns
/// `Ok(false)` when there is nothing to draw.
pub(crate) fn check_draw_range(
    count: u32,
    index_bytes: u64,
    vertex_bytes: Option<u64>,
) -> Result<bool, DeviceFault> {
    let available = index_bytes / INDEX_STRIDE as u64;
    if u64::from(count) > available {
        return Err(DeviceFault::invalid_operation(format!(
            "draw of {count} indices from a buffer holding {available}"
        )));
    }
    if count == 0 {
        return Ok(false);
    }
    if vertex_bytes == Some(0) {
        return Err(DeviceFault::invalid_operation("draw from an empty vertex buffer"));
    }
    Ok(true)
}

/// Handle-based graphics device.
///
/// Calls never return errors directly. A failing call leaves a
/// [`DeviceFault`] in the device's fault queue, which callers inspect through
/// [`checked!`](crate::checked) right after the call.
///
/// Binding state (bound vertex buffer, bound index buffer, current program,
/// vertex attribute layout, viewport) lives in the device and is changed only
/// through the calls below.
pub trait Device {
    /// Discards every queued fault.
    fn clear_errors(&self);

    /// Removes and returns every queued fault, oldest first.
    fn take_errors(&self) -> Vec<DeviceFault>;

    /// Allocates a buffer and uploads `contents` once; the data is static.
    fn create_buffer(&self, kind: BufferKind, contents: &[u8]) -> BufferId;

    /// Makes `buffer` the active buffer of `kind`; `None` unbinds.
    fn bind_buffer(&self, kind: BufferKind, buffer: Option<BufferId>);

    fn delete_buffer(&self, buffer: BufferId);

    /// Declares how the bound vertex buffer feeds a shader input.
    ///
    /// Programs capture the attribute layout declared when they are linked.
    fn vertex_attribute(&self, attribute: VertexAttribute);

    fn create_shader(&self, stage: ShaderStage) -> ShaderId;

    /// Replaces the stage's source and compiles it.
    fn compile_shader(&self, shader: ShaderId, source: &str);

    fn shader_compile_status(&self, shader: ShaderId) -> bool;

    /// Diagnostic output of the last compilation, empty on success.
    fn shader_info_log(&self, shader: ShaderId) -> String;

    fn delete_shader(&self, shader: ShaderId);

    fn create_program(&self) -> ProgramId;

    fn attach_shader(&self, program: ProgramId, shader: ShaderId);

    fn link_program(&self, program: ProgramId);

    /// Checks whether the program can run against the current device state.
    /// Problems are appended to the program info log.
    fn validate_program(&self, program: ProgramId);

    fn program_link_status(&self, program: ProgramId) -> bool;

    fn program_info_log(&self, program: ProgramId) -> String;

    /// Makes `program` current; `None` clears it.
    fn use_program(&self, program: Option<ProgramId>);

    fn delete_program(&self, program: ProgramId);

    /// Looks up a uniform by name in a linked program.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Writes a `vec4` uniform of the current program.
    fn uniform_4f(&self, location: UniformLocation, value: [f32; 4]);

    fn set_viewport(&self, viewport: Viewport);

    /// Clears the color buffer of the frame being recorded.
    fn clear(&self, color: [f32; 4]);

    /// Draws `count` indices from the bound index buffer as a triangle list.
    ///
    /// A draw of zero indices records nothing and is not a fault.
    fn draw_indexed(&self, count: u32);

    /// Finishes the frame being recorded and hands it to the display.
    fn present(&self);
}
