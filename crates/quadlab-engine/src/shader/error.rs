use crate::device::{DeviceError, ShaderStage};

/// Errors raised while building a shader program.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to compile {stage} shader:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("failed to link shader program:\n{log}")]
    Link { log: String },

    #[error("program has no active uniform named '{name}'")]
    MissingUniform { name: String },

    #[error(transparent)]
    Device(#[from] DeviceError),
}
