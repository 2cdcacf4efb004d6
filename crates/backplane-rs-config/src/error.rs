// crates/backplane-rs-config/src/error.rs

use backplane_rs::BackplaneError;
use core::fmt;

/// Errors that can occur while loading or validating a configuration document.
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON or does not match the schema.
    Json(serde_json::Error),

    /// The configuration file could not be read.
    #[cfg(feature = "std")]
    Io(std::io::Error),

    /// Two declared modules share one bus address.
    DuplicateAddress(u8),

    /// A declared module uses the broadcast address.
    ReservedAddress(u8),

    /// The process image regions of two declared modules overlap.
    OverlappingRegions { first: u8, second: u8 },

    /// A declared block ends past the process image.
    OutOfImage { address: u8, end: u32, image_size: usize },

    /// The bridge overrides produce an invalid `BridgeConfig`.
    InvalidBridge(BackplaneError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<BackplaneError> for ConfigError {
    fn from(e: BackplaneError) -> Self {
        ConfigError::InvalidBridge(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
            #[cfg(feature = "std")]
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::DuplicateAddress(address) => {
                write!(f, "Address {} is declared more than once", address)
            }
            ConfigError::ReservedAddress(address) => {
                write!(f, "Address {} is reserved and cannot be declared", address)
            }
            ConfigError::OverlappingRegions { first, second } => write!(
                f,
                "Process image regions of modules {} and {} overlap",
                first, second
            ),
            ConfigError::OutOfImage {
                address,
                end,
                image_size,
            } => write!(
                f,
                "Module {} ends at byte {}, past the {}-byte process image",
                address, end, image_size
            ),
            ConfigError::InvalidBridge(e) => write!(f, "Invalid bridge settings: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl ConfigError {
    /// Collapses the error into the core's `Copy` error for the `ConfigLoader` seam.
    pub fn to_backplane_error(&self) -> BackplaneError {
        match self {
            ConfigError::Json(_) => BackplaneError::ConfigLoad("malformed configuration document"),
            #[cfg(feature = "std")]
            ConfigError::Io(_) => BackplaneError::ConfigLoad("configuration file unreadable"),
            ConfigError::DuplicateAddress(_) => {
                BackplaneError::ValidationError("duplicate declared address")
            }
            ConfigError::ReservedAddress(_) => {
                BackplaneError::ValidationError("reserved declared address")
            }
            ConfigError::OverlappingRegions { .. } => {
                BackplaneError::ValidationError("overlapping declared regions")
            }
            ConfigError::OutOfImage { .. } => {
                BackplaneError::ValidationError("declared region outside the process image")
            }
            ConfigError::InvalidBridge(e) => *e,
        }
    }
}
