//! GLSL front end shared by the device implementations.
//!
//! Sources are GLSL 4.50 in the Vulkan dialect: uniforms live in blocks with
//! explicit `set`/`binding` qualifiers and every stage has a `main` entry
//! point. naga parses and validates each stage; its rendered diagnostics
//! become the stage's info log.

use wgpu::naga;
use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::device::ShaderStage;

/// A parsed and validated shader stage.
#[derive(Debug)]
pub(crate) struct StageModule {
    pub(crate) stage: ShaderStage,
    pub(crate) module: naga::Module,
    pub(crate) info: naga::valid::ModuleInfo,
    entry_point: usize,
}

/// Position of a uniform inside its block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct UniformSlot {
    pub(crate) group: u32,
    pub(crate) binding: u32,
    pub(crate) offset: u32,
    pub(crate) block_size: u32,
}

/// A uniform block some entry point reads.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct UniformBlock {
    pub(crate) group: u32,
    pub(crate) binding: u32,
    pub(crate) size: u32,
}

pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<StageModule, String> {
    let naga_stage = stage.to_naga();

    let module = Frontend::default()
        .parse(&Options::from(naga_stage), source)
        .map_err(|errors| errors.emit_to_string(source))?;

    let entry_point = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == naga_stage && ep.name == "main")
        .ok_or_else(|| format!("no `main` entry point for the {stage} stage"))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|err| err.emit_to_string(source))?;

    Ok(StageModule {
        stage,
        module,
        info,
        entry_point,
    })
}

/// Checks that every fragment input is fed by a vertex output.
pub(crate) fn check_interface(vertex: &StageModule, fragment: &StageModule) -> Result<(), String> {
    if vertex.stage != ShaderStage::Vertex {
        return Err(format!("expected a vertex stage, found {}", vertex.stage));
    }
    if fragment.stage != ShaderStage::Fragment {
        return Err(format!("expected a fragment stage, found {}", fragment.stage));
    }

    let mut outputs = Vec::new();
    if let Some(result) = &vertex.entry().function.result {
        collect_locations(&vertex.module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let mut inputs = Vec::new();
    for arg in &fragment.entry().function.arguments {
        collect_locations(&fragment.module, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    match inputs.iter().find(|loc| !outputs.contains(loc)) {
        Some(loc) => Err(format!(
            "fragment input at location {loc} is not written by the vertex stage"
        )),
        None => Ok(()),
    }
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(*location),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

impl StageModule {
    fn entry(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry_point]
    }

    /// Uniform globals the entry point actually reads, with their bindings.
    fn used_uniforms(
        &self,
    ) -> impl Iterator<Item = (&naga::GlobalVariable, &naga::ResourceBinding)> + '_ {
        let usage = self.info.get_entry_point(self.entry_point);
        self.module
            .global_variables
            .iter()
            .filter(move |(handle, var)| {
                var.space == naga::AddressSpace::Uniform && !usage[*handle].is_empty()
            })
            .filter_map(|(_, var)| var.binding.as_ref().map(|binding| (var, binding)))
    }

    pub(crate) fn uniform_blocks(&self) -> Vec<UniformBlock> {
        self.used_uniforms()
            .map(|(var, binding)| UniformBlock {
                group: binding.group,
                binding: binding.binding,
                size: self.module.types[var.ty].inner.size(self.module.to_ctx()),
            })
            .collect()
    }

    /// Resolves `name` to a block member, or to a whole uniform global.
    pub(crate) fn find_uniform(&self, name: &str) -> Option<UniformSlot> {
        self.used_uniforms().find_map(|(var, binding)| {
            let inner = &self.module.types[var.ty].inner;
            let block_size = inner.size(self.module.to_ctx());
            let offset = match inner {
                naga::TypeInner::Struct { members, .. } => members
                    .iter()
                    .find(|m| m.name.as_deref() == Some(name))
                    .map(|m| m.offset),
                _ => (var.name.as_deref() == Some(name)).then_some(0),
            }?;

            Some(UniformSlot {
                group: binding.group,
                binding: binding.binding,
                offset,
                block_size,
            })
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub(crate) const VERTEX: &str = "#version 450
layout(location = 0) in vec2 position;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

    pub(crate) const FRAGMENT: &str = "#version 450
layout(location = 0) out vec4 color;

layout(set = 0, binding = 0) uniform Material {
    vec4 u_Tint;
    vec4 u_Color;
};

void main() {
    color = u_Color;
}
";

    pub(crate) const BROKEN_VERTEX: &str = "#version 450
layout(location = 0) in vec2 position;

void main() {
    gl_Position = vec4(position 0.0, 1.0);
}
";

    /// Reads a varying nobody writes.
    pub(crate) const FRAGMENT_WITH_VARYING: &str = "#version 450
layout(location = 3) in vec4 v_Color;
layout(location = 0) out vec4 color;

void main() {
    color = v_Color;
}
";
}
