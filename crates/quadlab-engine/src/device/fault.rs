use std::fmt;

/// Category of a fault raised by the device.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FaultKind {
    /// Unknown handle or an argument out of range.
    InvalidValue,
    /// The call is not legal in the current device state.
    InvalidOperation,
    OutOfMemory,
    /// The backend rejected a resource or command.
    Validation,
    Internal,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::InvalidValue => "invalid value",
            FaultKind::InvalidOperation => "invalid operation",
            FaultKind::OutOfMemory => "out of memory",
            FaultKind::Validation => "validation",
            FaultKind::Internal => "internal",
        })
    }
}

/// One entry of the device fault queue.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct DeviceFault {
    pub kind: FaultKind,
    pub message: String,
}

impl DeviceFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidValue, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidOperation, message)
    }
}

impl From<wgpu::Error> for DeviceFault {
    fn from(err: wgpu::Error) -> Self {
        let kind = match &err {
            wgpu::Error::OutOfMemory { .. } => FaultKind::OutOfMemory,
            wgpu::Error::Validation { .. } => FaultKind::Validation,
            _ => FaultKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}
