//! Shader assets and programs.
//!
//! A shader asset is one text file holding both stages, each introduced by a
//! `#shader vertex` or `#shader fragment` marker line. [`ShaderSources`]
//! splits the file; [`link_program`] compiles both stages and links them into
//! a [`Program`].

mod error;
pub(crate) mod glsl;
mod program;
mod source;

pub use error::ShaderError;
pub use program::{compile_stage, link_program, CompiledStage, Program};
pub use source::ShaderSources;
