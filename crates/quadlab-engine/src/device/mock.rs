//! Recording device for tests.
//!
//! `MockDevice` keeps the same object and binding state a real device keeps,
//! compiles stages through the GLSL front end, raises the same faults for
//! misuse, and records every state-changing call so tests can assert on the
//! exact sequence.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::shader::glsl::{self, StageModule, UniformSlot};

use super::handle::IdAllocator;
use super::{
    check_draw_range, BufferId, BufferKind, Device, DeviceFault, ProgramId, ShaderId,
    ShaderStage, UniformLocation, VertexAttribute, Viewport,
};

/// A state-changing call received by [`MockDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer { kind: BufferKind, id: BufferId, len: usize },
    BindBuffer { kind: BufferKind, buffer: Option<BufferId> },
    DeleteBuffer(BufferId),
    VertexAttribute(VertexAttribute),
    CreateShader { stage: ShaderStage, id: ShaderId },
    CompileShader(ShaderId),
    DeleteShader(ShaderId),
    CreateProgram(ProgramId),
    AttachShader { program: ProgramId, shader: ShaderId },
    LinkProgram(ProgramId),
    ValidateProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    DeleteProgram(ProgramId),
    Uniform4f { location: UniformLocation, value: [f32; 4] },
    SetViewport(Viewport),
    Clear([f32; 4]),
    DrawIndexed { count: u32 },
    Present,
}

struct MockBuffer {
    kind: BufferKind,
    contents: Vec<u8>,
}

struct MockShader {
    stage: ShaderStage,
    compiled: Option<Rc<StageModule>>,
    log: String,
}

#[derive(Default)]
struct MockProgram {
    attached: Vec<ShaderId>,
    linked: bool,
    stages: Vec<Rc<StageModule>>,
    uniforms: Vec<(String, UniformSlot)>,
    log: String,
}

#[derive(Default)]
struct MockState {
    ids: IdAllocator,
    faults: Vec<DeviceFault>,
    calls: Vec<Call>,

    buffers: HashMap<BufferId, MockBuffer>,
    shaders: HashMap<ShaderId, MockShader>,
    programs: HashMap<ProgramId, MockProgram>,

    bound_vertex: Option<BufferId>,
    bound_index: Option<BufferId>,
    current_program: Option<ProgramId>,
    attributes: Vec<VertexAttribute>,
    viewport: Option<Viewport>,
}

impl MockState {
    fn fault(&mut self, fault: DeviceFault) {
        self.faults.push(fault);
    }

    fn bound_slot(&mut self, kind: BufferKind) -> &mut Option<BufferId> {
        match kind {
            BufferKind::Vertex => &mut self.bound_vertex,
            BufferKind::Index => &mut self.bound_index,
        }
    }
}

/// In-memory [`Device`] that records what it is asked to do.
#[derive(Default)]
pub struct MockDevice {
    state: RefCell<MockState>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a fault as if the next device call had raised it.
    pub fn inject_fault(&self, fault: DeviceFault) {
        self.state.borrow_mut().fault(fault);
    }

    /// Every state-changing call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Forgets the recorded calls; object state is kept.
    pub fn reset_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn buffer_exists(&self, id: BufferId) -> bool {
        self.state.borrow().buffers.contains_key(&id)
    }

    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&id).map(|b| b.contents.clone())
    }

    /// How many times `delete_buffer` was called with `id`.
    pub fn release_count(&self, id: BufferId) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| **call == Call::DeleteBuffer(id))
            .count()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn bound_buffer(&self, kind: BufferKind) -> Option<BufferId> {
        *self.state.borrow_mut().bound_slot(kind)
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.state.borrow().current_program
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.state.borrow().viewport
    }

    pub fn attributes(&self) -> Vec<VertexAttribute> {
        self.state.borrow().attributes.clone()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Device for MockDevice {
    fn clear_errors(&self) {
        self.state.borrow_mut().faults.clear();
    }

    fn take_errors(&self) -> Vec<DeviceFault> {
        std::mem::take(&mut self.state.borrow_mut().faults)
    }

    fn create_buffer(&self, kind: BufferKind, contents: &[u8]) -> BufferId {
        let mut state = self.state.borrow_mut();
        let id = BufferId::from(state.ids.next());
        state.buffers.insert(
            id,
            MockBuffer {
                kind,
                contents: contents.to_vec(),
            },
        );
        state.calls.push(Call::CreateBuffer {
            kind,
            id,
            len: contents.len(),
        });
        id
    }

    fn bind_buffer(&self, kind: BufferKind, buffer: Option<BufferId>) {
        self.record(Call::BindBuffer { kind, buffer });
        let mut state = self.state.borrow_mut();

        if let Some(id) = buffer {
            match state.buffers.get(&id).map(|b| b.kind) {
                None => {
                    state.fault(DeviceFault::invalid_value(format!("{id:?} does not exist")));
                    return;
                }
                Some(created) if created != kind => {
                    state.fault(DeviceFault::invalid_operation(format!(
                        "{id:?} was created as a {created:?} buffer"
                    )));
                    return;
                }
                Some(_) => {}
            }
        }

        *state.bound_slot(kind) = buffer;
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.record(Call::DeleteBuffer(buffer));
        let mut state = self.state.borrow_mut();

        let Some(removed) = state.buffers.remove(&buffer) else {
            state.fault(DeviceFault::invalid_value(format!("{buffer:?} does not exist")));
            return;
        };

        let slot = state.bound_slot(removed.kind);
        if *slot == Some(buffer) {
            *slot = None;
        }
    }

    fn vertex_attribute(&self, attribute: VertexAttribute) {
        self.record(Call::VertexAttribute(attribute));
        let mut state = self.state.borrow_mut();

        if !(1..=4).contains(&attribute.components) {
            state.fault(DeviceFault::invalid_value(format!(
                "{} components per attribute",
                attribute.components
            )));
            return;
        }

        state.attributes.retain(|a| a.location != attribute.location);
        state.attributes.push(attribute);
    }

    fn create_shader(&self, stage: ShaderStage) -> ShaderId {
        let mut state = self.state.borrow_mut();
        let id = ShaderId::from(state.ids.next());
        state.shaders.insert(
            id,
            MockShader {
                stage,
                compiled: None,
                log: String::new(),
            },
        );
        state.calls.push(Call::CreateShader { stage, id });
        id
    }

    fn compile_shader(&self, shader: ShaderId, source: &str) {
        self.record(Call::CompileShader(shader));
        let mut state = self.state.borrow_mut();

        let Some(entry) = state.shaders.get_mut(&shader) else {
            state.fault(DeviceFault::invalid_value(format!("{shader:?} does not exist")));
            return;
        };

        match glsl::compile(entry.stage, source) {
            Ok(module) => {
                entry.compiled = Some(Rc::new(module));
                entry.log.clear();
            }
            Err(log) => {
                entry.compiled = None;
                entry.log = log;
            }
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        let state = self.state.borrow();
        state
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled.is_some())
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        let state = self.state.borrow();
        state
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderId) {
        self.record(Call::DeleteShader(shader));
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader).is_none() {
            state.fault(DeviceFault::invalid_value(format!("{shader:?} does not exist")));
        }
    }

    fn create_program(&self) -> ProgramId {
        let mut state = self.state.borrow_mut();
        let id = ProgramId::from(state.ids.next());
        state.programs.insert(id, MockProgram::default());
        state.calls.push(Call::CreateProgram(id));
        id
    }

    fn attach_shader(&self, program: ProgramId, shader: ShaderId) {
        self.record(Call::AttachShader { program, shader });
        let mut state = self.state.borrow_mut();

        if !state.shaders.contains_key(&shader) {
            state.fault(DeviceFault::invalid_value(format!("{shader:?} does not exist")));
            return;
        }
        let Some(entry) = state.programs.get_mut(&program) else {
            state.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };
        if entry.attached.contains(&shader) {
            state.fault(DeviceFault::invalid_operation(format!(
                "{shader:?} is already attached to {program:?}"
            )));
            return;
        }
        entry.attached.push(shader);
    }

    fn link_program(&self, program: ProgramId) {
        self.record(Call::LinkProgram(program));
        let mut state = self.state.borrow_mut();
        let MockState {
            shaders,
            programs,
            faults,
            ..
        } = &mut *state;

        let Some(entry) = programs.get_mut(&program) else {
            faults.push(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };

        entry.linked = false;
        entry.stages.clear();
        entry.uniforms.clear();

        let mut vertex = None;
        let mut fragment = None;
        let mut log = String::new();

        for id in &entry.attached {
            let Some(shader) = shaders.get(id) else {
                log.push_str(&format!("{id:?} was deleted before linking\n"));
                continue;
            };
            let Some(module) = shader.compiled.clone() else {
                log.push_str(&format!("{id:?} is not compiled\n"));
                continue;
            };
            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.replace(module).is_some() {
                log.push_str(&format!("more than one {} stage attached\n", shader.stage));
            }
        }

        match (&vertex, &fragment) {
            (Some(v), Some(f)) if log.is_empty() => {
                if let Err(msg) = glsl::check_interface(v, f) {
                    log.push_str(&msg);
                }
            }
            (None, _) => log.push_str("no vertex stage attached\n"),
            (_, None) => log.push_str("no fragment stage attached\n"),
            _ => {}
        }

        entry.linked = log.is_empty();
        entry.log = log;
        if entry.linked {
            entry.stages = vertex.into_iter().chain(fragment).collect();
        }
    }

    fn validate_program(&self, program: ProgramId) {
        self.record(Call::ValidateProgram(program));
        let mut state = self.state.borrow_mut();

        let Some(entry) = state.programs.get_mut(&program) else {
            state.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        };
        if !entry.linked {
            entry.log.push_str("validation: program is not linked\n");
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
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
        self.record(Call::UseProgram(program));
        let mut state = self.state.borrow_mut();

        if let Some(id) = program {
            match state.programs.get(&id).map(|p| p.linked) {
                None => {
                    state.fault(DeviceFault::invalid_value(format!("{id:?} does not exist")));
                    return;
                }
                Some(false) => {
                    state.fault(DeviceFault::invalid_operation(format!("{id:?} is not linked")));
                    return;
                }
                Some(true) => {}
            }
        }

        state.current_program = program;
    }

    fn delete_program(&self, program: ProgramId) {
        self.record(Call::DeleteProgram(program));
        let mut state = self.state.borrow_mut();

        if state.programs.remove(&program).is_none() {
            state.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return;
        }
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.borrow_mut();

        let Some(entry) = state.programs.get_mut(&program) else {
            state.fault(DeviceFault::invalid_value(format!("{program:?} does not exist")));
            return None;
        };
        if !entry.linked {
            state.fault(DeviceFault::invalid_operation(format!("{program:?} is not linked")));
            return None;
        }

        if let Some(index) = entry.uniforms.iter().position(|(n, _)| n == name) {
            return Some(UniformLocation(index as u32));
        }

        let slot = entry.stages.iter().find_map(|s| s.find_uniform(name))?;
        entry.uniforms.push((name.to_owned(), slot));
        Some(UniformLocation((entry.uniforms.len() - 1) as u32))
    }

    fn uniform_4f(&self, location: UniformLocation, value: [f32; 4]) {
        self.record(Call::Uniform4f { location, value });
        let mut state = self.state.borrow_mut();

        let Some(current) = state.current_program else {
            state.fault(DeviceFault::invalid_operation("no program in use"));
            return;
        };
        let known = state
            .programs
            .get(&current)
            .and_then(|p| p.uniforms.get(location.0 as usize))
            .is_some();
        if !known {
            state.fault(DeviceFault::invalid_value(format!(
                "{location:?} does not belong to {current:?}"
            )));
        }
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.record(Call::SetViewport(viewport));
        self.state.borrow_mut().viewport = Some(viewport);
    }

    fn clear(&self, color: [f32; 4]) {
        self.record(Call::Clear(color));
    }

    fn draw_indexed(&self, count: u32) {
        self.record(Call::DrawIndexed { count });
        let mut state = self.state.borrow_mut();

        if state.current_program.is_none() {
            state.fault(DeviceFault::invalid_operation("draw without a program in use"));
            return;
        }
        let Some(vertex) = state.bound_vertex else {
            state.fault(DeviceFault::invalid_operation("draw without a vertex buffer"));
            return;
        };
        let Some(index) = state.bound_index else {
            state.fault(DeviceFault::invalid_operation("draw without an index buffer"));
            return;
        };

        let bytes = |id: BufferId| state.buffers.get(&id).map_or(0, |b| b.contents.len() as u64);
        let (index_bytes, vertex_bytes) = (bytes(index), bytes(vertex));
        if let Err(fault) = check_draw_range(count, index_bytes, Some(vertex_bytes)) {
            state.fault(fault);
        }
    }

    fn present(&self) {
        self.record(Call::Present);
    }
}
