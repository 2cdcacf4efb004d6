use crate::device::{DeclaredEntry, DeviceEntry, DeviceIndex};
use crate::process_image::ProcessImage;
use crate::telegram::ConfigTelegram;
use crate::types::{AddressError, ModuleType, Side};
use alloc::vec::Vec;
use core::array::TryFromSliceError;
use core::fmt;

/// Defines a portable, descriptive Error type for the backplane core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackplaneError {
    /// The provided buffer is too small for the operation.
    BufferTooShort,
    /// A telegram payload exceeds the maximum data length.
    PayloadTooLarge(usize),
    /// The bus transport reported a failure (timeout, CRC, no answer).
    BusError,
    /// The response telegram did not match the request (source, sequence or command).
    UnexpectedResponse(u16),
    /// The module answered with the ERROR bit set in the response code.
    ModuleRejected(u16),
    /// A value is not a valid module address.
    InvalidAddress(u8),
    /// A multi-byte value could not be parsed from a slice.
    SliceConversion,
    /// The Device Table has no room for another row.
    TableFull,
    /// A process image access was outside the configured region.
    OutOfImage { offset: usize, len: usize },
    /// A maintenance action is already pending.
    Busy,
    /// The bridge is not in a state that allows the operation.
    NotReady,
    /// The declared configuration could not be loaded.
    ConfigLoad(&'static str),
    /// A configuration value failed validation.
    ValidationError(&'static str),
    /// A cyclic driver reported a failed exchange.
    DriverError,
}

impl fmt::Display for BackplaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort => write!(f, "Buffer is too short for the telegram"),
            Self::PayloadTooLarge(len) => write!(f, "Payload of {len} bytes exceeds the telegram limit"),
            Self::BusError => write!(f, "Bus transport failure"),
            Self::UnexpectedResponse(cmd) => write!(f, "Unexpected response telegram (command {cmd:#06x})"),
            Self::ModuleRejected(cmd) => write!(f, "Module answered with error (command {cmd:#06x})"),
            Self::InvalidAddress(v) => write!(f, "Invalid module address: {v}"),
            Self::SliceConversion => write!(f, "Failed to convert slice to a fixed-size array"),
            Self::TableFull => write!(f, "Device table is full"),
            Self::OutOfImage { offset, len } => {
                write!(f, "Process image access out of range (offset {offset}, length {len})")
            }
            Self::Busy => write!(f, "Another maintenance action is pending"),
            Self::NotReady => write!(f, "Bridge is not ready for this operation"),
            Self::ConfigLoad(s) => write!(f, "Configuration load error: {}", s),
            Self::ValidationError(s) => write!(f, "Validation error: {}", s),
            Self::DriverError => write!(f, "Cyclic driver exchange failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BackplaneError {}

// --- From Implementations for Error Conversion ---

impl From<TryFromSliceError> for BackplaneError {
    fn from(_: TryFromSliceError) -> Self {
        BackplaneError::SliceConversion
    }
}

impl From<AddressError> for BackplaneError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::Reserved(val) => BackplaneError::InvalidAddress(val),
        }
    }
}

/// Direction of a physical signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    Input,
    Output,
}

/// Physical indicator outputs driven by the bridge controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Lit while the bridge is not running.
    Fault,
    A1Green,
    A1Red,
    A2Green,
    A2Red,
}

/// Presence signalling over the two pairs of dedicated backplane lines.
///
/// Each side has a sense line (read) and a config-enable line (driven).
pub trait SignalProbe {
    /// Samples the sense line of the given side. `true` means asserted.
    fn read_sense_line(&mut self, side: Side) -> bool;

    /// Drives the config-enable line of the given side.
    fn write_config_line(&mut self, side: Side, level: bool, direction: LineDirection);
}

/// Request/response transport for configuration telegrams.
///
/// Framing, checksums, retransmission and timeouts belong to the implementation.
/// The core only observes the overall outcome of each exchange.
pub trait BusTransport {
    /// Sends `request` and waits for the matching response.
    ///
    /// Broadcast requests have no response; implementations return `Ok(None)`.
    fn transfer(
        &mut self,
        request: &ConfigTelegram,
    ) -> Result<Option<ConfigTelegram>, BackplaneError>;
}

/// Source of the statically declared expected configuration.
pub trait ConfigLoader {
    fn load_declared_configuration(&mut self) -> Result<Vec<DeclaredEntry>, BackplaneError>;
}

/// Registry of device-type-specific cyclic I/O drivers.
///
/// Both methods run inside `BridgeController::run_cycle` while the bridge
/// lock is held. A driver that calls `BridgeControl` from here spins forever;
/// report failures through the returned error instead.
pub trait DriverRegistry {
    /// Starts the cyclic driver for a recognized module type.
    /// Returns `false` if no driver exists for the type.
    fn start_driver(&mut self, module_type: ModuleType, index: DeviceIndex) -> bool;

    /// Performs one cyclic I/O exchange for a device, reading its outputs from
    /// and writing its inputs into the process image.
    fn cyclic_exchange(
        &mut self,
        index: DeviceIndex,
        device: &DeviceEntry,
        image: &mut ProcessImage,
    ) -> Result<(), BackplaneError>;
}

/// LED and fault outputs.
pub trait Indicators {
    fn set_indicator(&mut self, indicator: Indicator, level: bool);
}

/// Thread-blocking delays used by the handshake and the end-of-configuration phase.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// The full set of collaborators a `BridgeController` needs.
///
/// Implemented automatically for any type that provides every piece.
///
/// Every method is called from within `BridgeController::run_cycle` or
/// `BridgeController::reset`, with the `BridgeControl` lock held.
/// Implementations must not call back into `BridgeControl` (`stop`,
/// `request_reset`, ...) from these callbacks. Hand the request to another
/// context instead.
pub trait BridgeHal:
    SignalProbe + BusTransport + ConfigLoader + DriverRegistry + Indicators + Delay
{
}

impl<T> BridgeHal for T where
    T: SignalProbe + BusTransport + ConfigLoader + DriverRegistry + Indicators + Delay
{
}
