/// Stages of the sandbox, in the only order they may be entered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    WindowCreated,
    ContextCurrent,
    ResourcesLoaded,
    Running,
    Terminated,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("illegal lifecycle transition {from:?} -> {to:?}")]
pub struct LifecycleError {
    pub from: Lifecycle,
    pub to: Lifecycle,
}

impl Lifecycle {
    fn successor(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::WindowCreated),
            Self::WindowCreated => Some(Self::ContextCurrent),
            Self::ContextCurrent => Some(Self::ResourcesLoaded),
            Self::ResourcesLoaded => Some(Self::Running),
            Self::Running => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }

    /// Moves to `to`, which must be the next stage.
    pub fn advance(&mut self, to: Lifecycle) -> Result<(), LifecycleError> {
        if self.successor() != Some(to) {
            return Err(LifecycleError { from: *self, to });
        }
        log::debug!("lifecycle {:?} -> {to:?}", *self);
        *self = to;
        Ok(())
    }

    /// Enters `Terminated` from any stage; startup failures end here too.
    pub fn terminate(&mut self) {
        *self = Self::Terminated;
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}
