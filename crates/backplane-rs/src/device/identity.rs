// crates/backplane-rs/src/device/identity.rs
use crate::hal::BackplaneError;
use crate::types::ModuleType;

/// Length of the identity record on the wire.
pub const IDENTITY_LEN: usize = 22;

/// Per-module descriptor returned by `GetDeviceInfo`.
///
/// Wire layout (little-endian):
/// `serial u32 | type u16 | hw rev u16 | sw major u16 | sw minor u16 |
///  svn u32 | input len u16 | output len u16 | features u16`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identity {
    pub serial_number: u32,
    pub module_type: ModuleType,
    pub hw_revision: u16,
    pub sw_major: u16,
    pub sw_minor: u16,
    /// Source revision the module firmware was built from.
    pub svn_revision: u32,
    /// Process input length in bytes.
    pub input_length: u16,
    /// Process output length in bytes.
    pub output_length: u16,
    pub feature_flags: u16,
}

impl Identity {
    /// Deserializes an identity record from a `GetDeviceInfo` response payload.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, BackplaneError> {
        if buffer.len() < IDENTITY_LEN {
            return Err(BackplaneError::BufferTooShort);
        }
        let u16_at = |pos: usize| -> Result<u16, BackplaneError> {
            Ok(u16::from_le_bytes(buffer[pos..pos + 2].try_into()?))
        };
        let u32_at = |pos: usize| -> Result<u32, BackplaneError> {
            Ok(u32::from_le_bytes(buffer[pos..pos + 4].try_into()?))
        };
        Ok(Self {
            serial_number: u32_at(0)?,
            module_type: ModuleType(u16_at(4)?),
            hw_revision: u16_at(6)?,
            sw_major: u16_at(8)?,
            sw_minor: u16_at(10)?,
            svn_revision: u32_at(12)?,
            input_length: u16_at(16)?,
            output_length: u16_at(18)?,
            feature_flags: u16_at(20)?,
        })
    }

    /// Serializes the record into `buffer`, returning the number of bytes written.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, BackplaneError> {
        if buffer.len() < IDENTITY_LEN {
            return Err(BackplaneError::BufferTooShort);
        }
        buffer[0..4].copy_from_slice(&self.serial_number.to_le_bytes());
        buffer[4..6].copy_from_slice(&self.module_type.0.to_le_bytes());
        buffer[6..8].copy_from_slice(&self.hw_revision.to_le_bytes());
        buffer[8..10].copy_from_slice(&self.sw_major.to_le_bytes());
        buffer[10..12].copy_from_slice(&self.sw_minor.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.svn_revision.to_le_bytes());
        buffer[16..18].copy_from_slice(&self.input_length.to_le_bytes());
        buffer[18..20].copy_from_slice(&self.output_length.to_le_bytes());
        buffer[20..22].copy_from_slice(&self.feature_flags.to_le_bytes());
        Ok(IDENTITY_LEN)
    }
}
