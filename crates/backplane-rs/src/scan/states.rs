use crate::types::Side;
use core::fmt;

/// Position of the topology scanner.
///
/// The right side is scanned first, then the left side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Release both config-enable lines.
    #[default]
    Init,
    /// Presence pulse: both config-enable lines driven high.
    PresentSignalling1,
    /// Pulse released, waiting for modules to settle.
    PresentSignalling2,
    /// Sample the right sense line once.
    InitialSlaveDetectionRight,
    /// Right config-enable asserted, waiting for the dwell time.
    ConfigRightStart,
    /// Run the handshake against the next right-side address.
    ConfigDialogueRight,
    /// Check whether another module follows on the right.
    SlaveDetectionRight,
    /// Sample the left sense line once.
    InitialSlaveDetectionLeft,
    ConfigLeftStart,
    ConfigDialogueLeft,
    SlaveDetectionLeft,
    /// Discovery finished. Terminal until the next reset.
    EndOfConfig,
}

impl ScanState {
    /// The backplane side this state works on, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Self::InitialSlaveDetectionRight
            | Self::ConfigRightStart
            | Self::ConfigDialogueRight
            | Self::SlaveDetectionRight => Some(Side::Right),
            Self::InitialSlaveDetectionLeft
            | Self::ConfigLeftStart
            | Self::ConfigDialogueLeft
            | Self::SlaveDetectionLeft => Some(Side::Left),
            Self::Init | Self::PresentSignalling1 | Self::PresentSignalling2 | Self::EndOfConfig => {
                None
            }
        }
    }

    pub fn is_complete(self) -> bool {
        self == Self::EndOfConfig
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_classification() {
        assert_eq!(ScanState::default(), ScanState::Init);
        assert_eq!(ScanState::ConfigDialogueRight.side(), Some(Side::Right));
        assert_eq!(ScanState::SlaveDetectionLeft.side(), Some(Side::Left));
        assert_eq!(ScanState::EndOfConfig.side(), None);
        assert!(ScanState::EndOfConfig.is_complete());
    }
}
