//! [`Device`] implementation on top of wgpu.
//!
//! wgpu has no global binding state and records work into command encoders,
//! so this type keeps the handle tables and binding state itself:
//! - buffers are created with their contents (static upload)
//! - a program is linked into a render pipeline using the vertex attribute
//!   layout declared at link time
//! - `clear`/`draw_indexed` record render passes into the frame being built;
//!   the frame is acquired lazily and submitted by `present`
//!
//! wgpu validation errors are routed into the fault queue through the
//! uncaptured-error handler.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::shader::glsl::{self, StageModule, UniformBlock, UniformSlot};

use super::handle::IdAllocator;
use super::{
    check_draw_range, BufferId, BufferKind, Device, DeviceFault, FaultKind, Gpu, GpuFrame,
    GpuInit, ProgramId, ShaderId, ShaderStage, SurfaceErrorAction, UniformLocation,
    VertexAttribute, Viewport, INDEX_FORMAT,
};

struct BufferObject {
    kind: BufferKind,
    buffer: wgpu::Buffer,
}

struct CompiledShader {
    stage: StageModule,
    module: wgpu::ShaderModule,
}

struct ShaderObject {
    stage: ShaderStage,
    compiled: Option<Rc<CompiledShader>>,
    log: String,
}

struct UniformBuffer {
    block: UniformBlock,
    buffer: wgpu::Buffer,
}

struct LinkedProgram {
    pipeline: wgpu::RenderPipeline,
    stages: Vec<Rc<CompiledShader>>,
    attributes: Vec<VertexAttribute>,
    uniform_buffers: Vec<UniformBuffer>,
    bind_groups: Vec<(u32, wgpu::BindGroup)>,
    uniforms: Vec<(String, UniformSlot)>,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<ShaderId>,
    linked: Option<LinkedProgram>,
    log: String,
}

#[derive(Default)]
enum FrameState {
    #[default]
    Idle,
    Recording(GpuFrame),
    /// The surface could not provide a texture; drawing is dropped until
    /// the next `present`.
    Skipped,
}

#[derive(Default)]
struct State {
    ids: IdAllocator,

    buffers: HashMap<BufferId, BufferObject>,
    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,

    bound_vertex: Option<BufferId>,
    bound_index: Option<BufferId>,
    current_program: Option<ProgramId>,
    attributes: Vec<VertexAttribute>,
    viewport: Option<Viewport>,

    frame: FrameState,
}

/// GPU device presenting to one window.
pub struct WgpuDevice {
    window: Arc<Window>,
    gpu: RefCell<Gpu>,
    faults: Arc<Mutex<Vec<DeviceFault>>>,
    state: RefCell<State>,
}

impl WgpuDevice {
    /// Creates the wgpu device and the window surface; blocks until the
    /// adapter and device are ready.
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(Arc::clone(&window), init))?;

        let info = gpu.adapter_info();
        log::info!(
            "graphics device: {} ({:?}, {:?})",
            info.name,
            info.backend,
            gpu.surface_format()
        );

        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        gpu.device()
            .on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
                sink.lock().push(DeviceFault::from(err));
            }));

        Ok(Self {
            window,
            gpu: RefCell::new(gpu),
            faults,
            state: RefCell::new(State::default()),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures the surface for a new framebuffer size.
    pub fn resize(&self, size: PhysicalSize<u32>) {
        self.gpu.borrow_mut().resize(size);
    }

    fn fault(&self, fault: DeviceFault) {
        self.faults.lock().push(fault);
    }

    fn ensure_frame(&self, frame: &mut FrameState) {
        if !matches!(frame, FrameState::Idle) {
            return;
        }

        let mut gpu = self.gpu.borrow_mut();
        *frame = match gpu.begin_frame() {
            Ok(acquired) => FrameState::Recording(acquired),
            Err(err) => match gpu.handle_surface_error(err) {
                SurfaceErrorAction::Fatal => {
                    self.fault(DeviceFault::new(
                        FaultKind::OutOfMemory,
                        "surface texture acquisition ran out of memory",
                    ));
                    FrameState::Skipped
                }
                action => {
                    log::debug!("skipping frame after surface error ({action:?})");
                    FrameState::Skipped
                }
            },
        };
    }

    fn link(&self, state: &State, entry: &ProgramObject) -> Result<LinkedProgram, String> {
        let mut vertex: Option<Rc<CompiledShader>> = None;
        let mut fragment: Option<Rc<CompiledShader>> = None;

        for id in &entry.attached {
            let shader = state
                .shaders
                .get(id)
                .ok_or_else(|| format!("{id:?} was deleted before linking"))?;
            let compiled = shader
                .compiled
                .clone()
                .ok_or_else(|| format!("{id:?} is not compiled"))?;
            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.replace(compiled).is_some() {
                return Err(format!("more than one {} stage attached", shader.stage));
            }
        }

        let vertex = vertex.ok_or("no vertex stage attached")?;
        let fragment = fragment.ok_or("no fragment stage attached")?;
        glsl::check_interface(&vertex.stage, &fragment.stage)?;

        let attributes = state.attributes.clone();
        let stride = match attributes.first() {
            Some(first) if attributes.iter().any(|a| a.stride != first.stride) => {
                return Err("vertex attributes disagree on the vertex stride".to_owned());
            }
            Some(first) => first.stride,
            None => 0,
        };
        let wgpu_attributes: Vec<wgpu::VertexAttribute> = attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: float_format(a.components),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();
        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu_attributes,
        };
        let vertex_buffers: &[wgpu::VertexBufferLayout] = if attributes.is_empty() {
            &[]
        } else {
            std::slice::from_ref(&vertex_layout)
        };

        let gpu = self.gpu.borrow();
        let device = gpu.device();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quadlab program pipeline"),
            // Derived from the shaders' uniform declarations.
            layout: None,

            vertex: wgpu::VertexState {
                module: &vertex.module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                buffers: vertex_buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &fragment.module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.surface_format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let mut blocks: Vec<UniformBlock> = Vec::new();
        for block in vertex
            .stage
            .uniform_blocks()
            .into_iter()
            .chain(fragment.stage.uniform_blocks())
        {
            match blocks
                .iter_mut()
                .find(|b| (b.group, b.binding) == (block.group, block.binding))
            {
                Some(existing) => existing.size = existing.size.max(block.size),
                None => blocks.push(block),
            }
        }
        blocks.sort_by_key(|b| (b.group, b.binding));

        let uniform_buffers: Vec<UniformBuffer> = blocks
            .into_iter()
            .map(|block| UniformBuffer {
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("quadlab uniform block"),
                    size: u64::from(block.size.max(16).next_multiple_of(16)),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                block,
            })
            .collect();

        let mut groups: Vec<u32> = uniform_buffers.iter().map(|u| u.block.group).collect();
        groups.dedup();

        let bind_groups = groups
            .into_iter()
            .map(|group| {
                let entries: Vec<wgpu::BindGroupEntry> = uniform_buffers
                    .iter()
                    .filter(|u| u.block.group == group)
                    .map(|u| wgpu::BindGroupEntry {
                        binding: u.block.binding,
                        resource: u.buffer.as_entire_binding(),
                    })
                    .collect();

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("quadlab uniform bind group"),
                    layout: &pipeline.get_bind_group_layout(group),
                    entries: &entries,
                });
                (group, bind_group)
            })
            .collect();

        Ok(LinkedProgram {
            pipeline,
            stages: vec![vertex, fragment],
            attributes,
            uniform_buffers,
            bind_groups,
            uniforms: Vec::new(),
        })
    }
}

fn float_format(components: u8) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

/// Intersects `viewport` with the render target; `None` if nothing is left.
fn clamp_viewport(viewport: Viewport, width: u32, height: u32) -> Option<Viewport> {
    let x = viewport.x.min(width);
    let y = viewport.y.min(height);
    let clamped = Viewport {
        x,
        y,
        width: viewport.width.min(width - x),
        height: viewport.height.min(height - y),
    };
    (clamped.width > 0 && clamped.height > 0).then_some(clamped)
}

impl Device for WgpuDevice {
    fn clear_errors(&self) {
        self.faults.lock().clear();
    }

    fn take_errors(&self) -> Vec<DeviceFault> {
        std::mem::take(&mut *self.faults.lock())
    }

    fn create_buffer(&self, kind: BufferKind, contents: &[u8]) -> BufferId {
        let (label, usage) = match kind {
            BufferKind::Vertex => ("quadlab vertex buffer", wgpu::BufferUsages::VERTEX),
            BufferKind::Index => ("quadlab index buffer", wgpu::BufferUsages::INDEX),
        };

        let buffer = self
            .gpu
            .borrow()
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });

        let mut state = self.state.borrow_mut();
        let id = BufferId::from(state.ids.next());
        state.buffers.insert(id, BufferObject { kind, buffer });
        id
    }

    fn bind_buffer(&self, kind: BufferKind, buffer: Option<BufferId>) {
        let mut state = self.state.borrow_mut();

        if let Some(id) = buffer {
            match state.buffers.get(&id).map(|b| b.kind) {
                None => {
                    self.fault(DeviceFault::invalid_value(format!("{id:?} does not exist")));
                    return;
                }
                Some(created) if created != kind => {
                    self.fault(DeviceFault::invalid_operation(format!(
                        "{id:?} was created as a {created:?} buffer"
                    )));
                    return;
                }
                Some(_) => {}
            }
        }

        match kind {
            BufferKind::Vertex => state.bound_vertex = buffer,
            BufferKind::Index => state.bound_index = buffer,
        }
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut state = self.state.borrow_mut();

        let Some(removed) = state.buffers.remove(&buffer) else {
            self.fault(DeviceFault::invalid_value(format!("{buffer:?} does not exist")));
            return;
        };
        removed.buffer.destroy();

        let slot = match removed.kind {
            BufferKind::Vertex => &mut state.bound_vertex,
            BufferKind::Index => &mut state.bound_index,
        };
        if *slot == Some(buffer) {
            *slot = None;
        }
    }

    fn vertex_attribute(&self, attribute: VertexAttribute) {
        if !(1..=4).contains(&attribute.components) {
            self.fault(DeviceFault::invalid_value(format!(
                "{} components per attribute",
                attribute.components
            )));
            return;
        }

        let mut state = self.state.borrow_mut();
        state.attributes.retain(|a| a.location != attribute.location);
        state.attributes.push(attribute);
    }

    fn create_shader(&self, stage: ShaderStage) -> ShaderId {
        let mut state = self.state.borrow_mut();
        let id = ShaderId::from(state.ids.next());
        state.shaders.insert(
            id,
            ShaderObject {
                stage,
                compiled: None,
                log: String::new(),
            },
        );
        id
    }

    fn compile_shader(&self, shader: ShaderId, source: &str) {
        let mut state = self.state.borrow_mut();

        let Some(entry) = state.shaders.get_mut(&shader) else {
            self.fault(DeviceFault::invalid_value(format!("{shader:?} does not exist")));
            return;
        };

        match glsl::compile(entry.stage, source) {
            Ok(stage) => {
                let module = self.gpu.borrow().device().create_shader_module(
                    wgpu::ShaderModuleDescriptor {
                        label: Some("quadlab shader stage"),
                        source: wgpu::ShaderSource::Naga(Cow::Owned(stage.module.clone())),
                    },
                );
                entry.compiled = Some(Rc::new(CompiledShader { stage, module }));
                entry.log.clear();
            }
            Err(log) => {
                entry.compiled = None;
                entry.log = log;
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled.is_some())
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderId) {
        if self.state.borrow_mut().shaders.remove(&shader).is_none() {
            self.fault(DeviceFault::invalid_value(format!("{shader:?} does not exist")));
        }
    }

    fn create_program(&self) -> ProgramId {
        let mut state = self.state.borrow_mut();
        let id = ProgramId::from(state.ids.next());
        state.programs.insert(id, ProgramObject::default());
        id
    }

    fn attach_shader(&self, program: ProgramId, shader: ShaderId) {
        let mut state = self.state.borrow_mut();

        if !state.shaders.contains_key(&shader) {
            self.fault(DeviceFault::invalid_value(format!("{shader:?} does not exist")));
            return;
        }
        let Some(entry) = state.programs.get_mut(&program) else {
            self.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };
        if entry.attached.contains(&shader) {
            self.fault(DeviceFault::invalid_operation(format!(
                "{shader:?} is already attached to {program:?}"
            )));
            return;
        }
        entry.attached.push(shader);
    }

    fn link_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();

        let Some(mut entry) = state.programs.remove(&program) else {
            self.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };

        match self.link(&state, &entry) {
            Ok(linked) => {
                entry.linked = Some(linked);
                entry.log.clear();
            }
            Err(log) => {
                entry.linked = None;
                entry.log = log;
            }
        }

        state.programs.insert(program, entry);
    }

    fn validate_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        let State {
            programs,
            attributes,
            ..
        } = &mut *state;

        let Some(entry) = programs.get_mut(&program) else {
            self.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };

        match &entry.linked {
            None => entry.log.push_str("validation: program is not linked\n"),
            Some(linked) if linked.attributes != *attributes => entry
                .log
                .push_str("validation: vertex attribute layout changed since link\n"),
            Some(_) => {}
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked.is_some())
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<ProgramId>) {
        let mut state = self.state.borrow_mut();

        if let Some(id) = program {
            match state.programs.get(&id).map(|p| p.linked.is_some()) {
                None => {
                    self.fault(DeviceFault::invalid_value(format!("{id:?} does not exist")));
                    return;
                }
                Some(false) => {
                    self.fault(DeviceFault::invalid_operation(format!("{id:?} is not linked")));
                    return;
                }
                Some(true) => {}
            }
        }

        state.current_program = program;
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();

        let Some(removed) = state.programs.remove(&program) else {
            self.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };
        if let Some(linked) = removed.linked {
            for uniform in &linked.uniform_buffers {
                uniform.buffer.destroy();
            }
        }
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();

        let Some(entry) = state.programs.get_mut(&program) else {
            self.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return None;
        };
        let Some(linked) = entry.linked.as_mut() else {
            self.fault(DeviceFault::invalid_operation(format!("{program:?} is not linked")));
            return None;
        };

        if let Some(index) = linked.uniforms.iter().position(|(n, _)| n == name) {
            return Some(UniformLocation(index as u32));
        }

        let slot = linked
            .stages
            .iter()
            .find_map(|s| s.stage.find_uniform(name))?;
        linked.uniforms.push((name.to_owned(), slot));
        Some(UniformLocation((linked.uniforms.len() - 1) as u32))
    }

    fn uniform_4f(&self, location: UniformLocation, value: [f32; 4]) {
        let state = self.state.borrow();

        let Some(current) = state.current_program else {
            self.fault(DeviceFault::invalid_operation("no program in use"));
            return;
        };
        let Some(linked) = state
            .programs
            .get(&current)
            .and_then(|p| p.linked.as_ref())
        else {
            self.fault(DeviceFault::invalid_operation(format!("{current:?} is not linked")));
            return;
        };
        let Some((name, slot)) = linked.uniforms.get(location.0 as usize) else {
            self.fault(DeviceFault::invalid_value(format!(
                "{location:?} does not belong to {current:?}"
            )));
            return;
        };

        let bytes = bytemuck::bytes_of(&value);
        if slot.offset as usize + bytes.len() > slot.block_size as usize {
            self.fault(DeviceFault::invalid_operation(format!(
                "uniform '{name}' is smaller than a vec4"
            )));
            return;
        }

        let target = linked
            .uniform_buffers
            .iter()
            .find(|u| (u.block.group, u.block.binding) == (slot.group, slot.binding));
        match target {
            Some(uniform) => {
                self.gpu
                    .borrow()
                    .queue()
                    .write_buffer(&uniform.buffer, u64::from(slot.offset), bytes);
            }
            None => self.fault(DeviceFault::new(
                FaultKind::Internal,
                format!("no uniform buffer backs '{name}'"),
            )),
        }
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.state.borrow_mut().viewport = Some(viewport);
    }

    fn clear(&self, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        self.ensure_frame(&mut state.frame);

        let FrameState::Recording(frame) = &mut state.frame else {
            return;
        };

        let [r, g, b, a] = color.map(f64::from);
        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quadlab clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn draw_indexed(&self, count: u32) {
        let mut state = self.state.borrow_mut();
        let State {
            buffers,
            programs,
            bound_vertex,
            bound_index,
            current_program,
            viewport,
            frame,
            ..
        } = &mut *state;

        let Some(linked) = current_program
            .and_then(|id| programs.get(&id))
            .and_then(|p| p.linked.as_ref())
        else {
            self.fault(DeviceFault::invalid_operation("draw without a program in use"));
            return;
        };
        let vertex = bound_vertex
            .and_then(|id| buffers.get(&id))
            .filter(|_| !linked.attributes.is_empty());
        if vertex.is_none() && !linked.attributes.is_empty() {
            self.fault(DeviceFault::invalid_operation("draw without a vertex buffer"));
            return;
        }
        let Some(index) = bound_index.and_then(|id| buffers.get(&id)) else {
            self.fault(DeviceFault::invalid_operation("draw without an index buffer"));
            return;
        };

        match check_draw_range(count, index.buffer.size(), vertex.map(|v| v.buffer.size())) {
            Ok(true) => {}
            Ok(false) => return,
            Err(fault) => {
                self.fault(fault);
                return;
            }
        }

        self.ensure_frame(frame);
        let FrameState::Recording(frame) = frame else {
            return;
        };

        let target = frame.surface_texture.texture.size();
        let requested = viewport.unwrap_or(Viewport::from_size(target.width, target.height));
        let Some(vp) = clamp_viewport(requested, target.width, target.height) else {
            return;
        };

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quadlab draw"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_viewport(
            vp.x as f32,
            vp.y as f32,
            vp.width as f32,
            vp.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&linked.pipeline);
        for (group, bind_group) in &linked.bind_groups {
            pass.set_bind_group(*group, bind_group, &[]);
        }
        if let Some(vertex) = vertex {
            pass.set_vertex_buffer(0, vertex.buffer.slice(..));
        }
        pass.set_index_buffer(index.buffer.slice(..), INDEX_FORMAT);
        pass.draw_indexed(0..count, 0, 0..1);
    }

    fn present(&self) {
        let frame = std::mem::take(&mut self.state.borrow_mut().frame);

        if let FrameState::Recording(frame) = frame {
            self.window.pre_present_notify();
            self.gpu.borrow().submit(frame);
        }
    }
}
