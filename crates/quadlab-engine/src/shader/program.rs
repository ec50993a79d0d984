use std::fmt;
use std::mem::ManuallyDrop;

use crate::checked;
use crate::device::{Device, DeviceError, ProgramId, ShaderId, ShaderStage, UniformLocation};

use super::{ShaderError, ShaderSources};

/// A successfully compiled stage object, deleted on drop.
pub struct CompiledStage<'d, D: Device> {
    device: &'d D,
    id: ShaderId,
    stage: ShaderStage,
}

impl<D: Device> CompiledStage<'_, D> {
    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Deletes the stage object now, reporting device faults to the caller.
    pub fn release(self) -> Result<(), DeviceError> {
        let this = ManuallyDrop::new(self);
        checked!(this.device, this.device.delete_shader(this.id))
    }
}

impl<D: Device> fmt::Debug for CompiledStage<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledStage")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .finish()
    }
}

impl<D: Device> Drop for CompiledStage<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = checked!(self.device, self.device.delete_shader(self.id)) {
            log::error!("failed to release {} shader: {e}", self.stage);
        }
    }
}

/// Creates a stage object and compiles `source` into it.
///
/// On failure the stage object is released and the compiler log is returned
/// in [`ShaderError::Compile`].
pub fn compile_stage<'d, D: Device>(
    device: &'d D,
    stage: ShaderStage,
    source: &str,
) -> Result<CompiledStage<'d, D>, ShaderError> {
    let id = checked!(device, device.create_shader(stage))?;
    let compiled = CompiledStage { device, id, stage };

    checked!(device, device.compile_shader(id, source))?;

    if !checked!(device, device.shader_compile_status(id))? {
        let log = checked!(device, device.shader_info_log(id))?;
        log::error!("failed to compile {stage} shader:\n{log}");
        compiled.release()?;
        return Err(ShaderError::Compile { stage, log });
    }

    Ok(compiled)
}

/// Compiles both stages of `sources` and links them into a program.
///
/// A stage that fails to compile aborts the build before anything is
/// attached. The stage objects are released once the program is linked.
pub fn link_program<'d, D: Device>(
    device: &'d D,
    sources: &ShaderSources,
) -> Result<Program<'d, D>, ShaderError> {
    let id = checked!(device, device.create_program())?;
    let program = Program { device, id };

    let vertex = compile_stage(device, ShaderStage::Vertex, &sources.vertex)?;
    let fragment = compile_stage(device, ShaderStage::Fragment, &sources.fragment)?;

    checked!(device, device.attach_shader(id, vertex.id()))?;
    checked!(device, device.attach_shader(id, fragment.id()))?;
    checked!(device, device.link_program(id))?;
    checked!(device, device.validate_program(id))?;

    let linked = checked!(device, device.program_link_status(id))?;
    let log = checked!(device, device.program_info_log(id))?;

    vertex.release()?;
    fragment.release()?;

    if !linked {
        log::error!("failed to link shader program:\n{log}");
        return Err(ShaderError::Link { log });
    }
    if !log.is_empty() {
        log::warn!("shader program linked with diagnostics:\n{log}");
    }

    log::debug!("linked shader program {id:?}");
    Ok(program)
}

/// A linked shader program, deleted on drop.
pub struct Program<'d, D: Device> {
    device: &'d D,
    id: ProgramId,
}

impl<D: Device> Program<'_, D> {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Makes this the current program for draws and uniform uploads.
    pub fn bind(&self) -> Result<(), DeviceError> {
        checked!(self.device, self.device.use_program(Some(self.id)))
    }

    pub fn unbind(&self) -> Result<(), DeviceError> {
        checked!(self.device, self.device.use_program(None))
    }

    pub fn uniform_location(&self, name: &str) -> Result<UniformLocation, ShaderError> {
        checked!(self.device, self.device.uniform_location(self.id, name))?.ok_or_else(|| {
            ShaderError::MissingUniform {
                name: name.to_owned(),
            }
        })
    }

    /// Uploads a `vec4` uniform; the program must be bound.
    pub fn set_uniform_4f(
        &self,
        location: UniformLocation,
        value: [f32; 4],
    ) -> Result<(), DeviceError> {
        checked!(self.device, self.device.uniform_4f(location, value))
    }
}

impl<D: Device> fmt::Debug for Program<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Program").field(&self.id).finish()
    }
}

impl<D: Device> Drop for Program<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = checked!(self.device, self.device.delete_program(self.id)) {
            log::error!("failed to release shader program: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{Call, MockDevice};
    use crate::shader::glsl::fixtures::*;

    fn sources(vertex: &str, fragment: &str) -> ShaderSources {
        ShaderSources {
            vertex: vertex.to_owned(),
            fragment: fragment.to_owned(),
        }
    }

    #[test]
    fn minimal_sources_link() {
        let device = MockDevice::new();
        let program = link_program(&device, &sources(VERTEX, FRAGMENT)).unwrap();

        assert!(device.program_link_status(program.id()));
        assert_eq!(device.live_programs(), 1);
        assert_eq!(device.live_shaders(), 0);
    }

    #[test]
    fn build_follows_create_compile_attach_link_validate_release() {
        let device = MockDevice::new();
        let program = link_program(&device, &sources(VERTEX, FRAGMENT)).unwrap();

        let calls = device.calls();
        let (vs, fs) = match (&calls[1], &calls[3]) {
            (
                Call::CreateShader {
                    stage: ShaderStage::Vertex,
                    id: vs,
                },
                Call::CreateShader {
                    stage: ShaderStage::Fragment,
                    id: fs,
                },
            ) => (*vs, *fs),
            other => panic!("unexpected stage creation: {other:?}"),
        };
        let id = program.id();

        assert_eq!(
            calls,
            vec![
                Call::CreateProgram(id),
                Call::CreateShader {
                    stage: ShaderStage::Vertex,
                    id: vs
                },
                Call::CompileShader(vs),
                Call::CreateShader {
                    stage: ShaderStage::Fragment,
                    id: fs
                },
                Call::CompileShader(fs),
                Call::AttachShader {
                    program: id,
                    shader: vs
                },
                Call::AttachShader {
                    program: id,
                    shader: fs
                },
                Call::LinkProgram(id),
                Call::ValidateProgram(id),
                Call::DeleteShader(vs),
                Call::DeleteShader(fs),
            ]
        );
    }

    #[test]
    fn vertex_syntax_error_stops_before_linking() {
        let device = MockDevice::new();
        let err = link_program(&device, &sources(BROKEN_VERTEX, FRAGMENT)).unwrap_err();

        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected a compile error, got {other:?}"),
        }

        let calls = device.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::LinkProgram(_))));
        assert!(!calls.iter().any(|c| matches!(c, Call::AttachShader { .. })));
        assert!(!calls.iter().any(|c| matches!(
            c,
            Call::CreateShader {
                stage: ShaderStage::Fragment,
                ..
            }
        )));
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn empty_sources_fail_to_compile() {
        let device = MockDevice::new();
        let err = link_program(&device, &ShaderSources::default()).unwrap_err();

        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn interface_mismatch_is_a_link_error() {
        let device = MockDevice::new();
        let err = link_program(&device, &sources(VERTEX, FRAGMENT_WITH_VARYING)).unwrap_err();

        match err {
            ShaderError::Link { log } => assert!(!log.is_empty()),
            other => panic!("expected a link error, got {other:?}"),
        }
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn uniforms_resolve_by_member_name() {
        let device = MockDevice::new();
        let program = link_program(&device, &sources(VERTEX, FRAGMENT)).unwrap();

        program.bind().unwrap();
        let location = program.uniform_location("u_Color").unwrap();
        program
            .set_uniform_4f(location, [0.05, 0.5, 0.5, 1.0])
            .unwrap();

        assert_eq!(device.current_program(), Some(program.id()));
        assert_eq!(
            device.calls().last(),
            Some(&Call::Uniform4f {
                location,
                value: [0.05, 0.5, 0.5, 1.0]
            })
        );
    }

    #[test]
    fn unknown_uniform_is_reported_by_name() {
        let device = MockDevice::new();
        let program = link_program(&device, &sources(VERTEX, FRAGMENT)).unwrap();

        match program.uniform_location("u_Missing") {
            Err(ShaderError::MissingUniform { name }) => assert_eq!(name, "u_Missing"),
            other => panic!("expected a missing uniform, got {other:?}"),
        }
    }

    #[test]
    fn drop_deletes_program_and_clears_current() {
        let device = MockDevice::new();
        let id = {
            let program = link_program(&device, &sources(VERTEX, FRAGMENT)).unwrap();
            program.bind().unwrap();
            program.id()
        };

        assert!(device.calls().contains(&Call::DeleteProgram(id)));
        assert_eq!(device.current_program(), None);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn failed_stage_is_released() {
        let device = MockDevice::new();
        let err = compile_stage(&device, ShaderStage::Vertex, BROKEN_VERTEX).unwrap_err();

        assert!(matches!(err, ShaderError::Compile { .. }));
        assert_eq!(device.live_shaders(), 0);
    }

    #[test]
    fn compiled_stage_debug_names_its_stage() {
        let device = MockDevice::new();
        let stage = compile_stage(&device, ShaderStage::Fragment, FRAGMENT).unwrap();

        let text = format!("{stage:?}");

        assert!(text.starts_with("CompiledStage"));
        assert!(text.contains("Fragment"));
    }
}
