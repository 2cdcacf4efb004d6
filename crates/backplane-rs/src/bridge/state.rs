use core::fmt;

/// Lifecycle of the whole backplane subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    /// Nothing is scanned or polled. Maintenance actions run here.
    #[default]
    Stopped,
    /// The topology scan is in progress.
    Initializing,
    /// Discovery finished and the cyclic exchange is active.
    Running,
}

impl BridgeState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Running => write!(f, "Running"),
        }
    }
}
