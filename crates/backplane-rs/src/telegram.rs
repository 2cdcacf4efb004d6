// crates/backplane-rs/src/telegram.rs
//! Configuration telegrams exchanged with modules during discovery and maintenance.

use crate::hal::BackplaneError;
use crate::types::{Address, C_TEL_MAX_DATA};
use alloc::vec::Vec;
use core::convert::TryFrom;

/// Size of the fixed telegram header: dst, src, command, sequence, length.
pub const TELEGRAM_HEADER_LEN: usize = 8;

/// Bit set in the command code of a successful response.
pub const RESPONSE_OK: u16 = 0x4000;

/// Bit set in the command code of a failed response.
pub const RESPONSE_ERROR: u16 = 0x8000;

/// Mask extracting the base command code from a response code.
pub const COMMAND_MASK: u16 = 0x3FFF;

/// Bus commands used by the scanner, the dispatcher bring-up and maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BusCommand {
    /// Request the module's identity record.
    GetDeviceInfo = 0x0003,
    /// Switch the module's firmware into update mode.
    SetFirmwareUpdateMode = 0x000F,
    /// Force a firmware reset.
    ForceReset = 0x0010,
    /// Program the module's serial number.
    WriteSerialNumber = 0x0011,
    /// Assign the final bus address.
    PiIoSetAddress = 0x0014,
    /// Commit the module-side configuration.
    PiIoConfigure = 0x0016,
    /// Broadcast: begin cyclic I/O.
    PiIoStartDataExchange = 0x0017,
}

impl BusCommand {
    /// The command code a module puts in a successful answer.
    pub fn ok_response(self) -> u16 {
        self as u16 | RESPONSE_OK
    }

    /// The command code a module puts in a failed answer.
    pub fn error_response(self) -> u16 {
        self as u16 | RESPONSE_ERROR
    }
}

impl TryFrom<u16> for BusCommand {
    type Error = BackplaneError;

    /// Parses a base command code. Response bits are ignored.
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value & COMMAND_MASK {
            0x0003 => Ok(Self::GetDeviceInfo),
            0x000F => Ok(Self::SetFirmwareUpdateMode),
            0x0010 => Ok(Self::ForceReset),
            0x0011 => Ok(Self::WriteSerialNumber),
            0x0014 => Ok(Self::PiIoSetAddress),
            0x0016 => Ok(Self::PiIoConfigure),
            0x0017 => Ok(Self::PiIoStartDataExchange),
            _ => Err(BackplaneError::UnexpectedResponse(value)),
        }
    }
}

/// A configuration telegram on the serial bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTelegram {
    pub destination: Address,
    pub source: Address,
    /// Base command code, possibly with `RESPONSE_OK` / `RESPONSE_ERROR` bits.
    pub command: u16,
    pub sequence: u16,
    pub data: Vec<u8>,
}

impl ConfigTelegram {
    /// Builds a request telegram. Fails if the payload exceeds the telegram limit.
    pub fn request(
        destination: Address,
        source: Address,
        command: BusCommand,
        sequence: u16,
        data: &[u8],
    ) -> Result<Self, BackplaneError> {
        if data.len() > C_TEL_MAX_DATA {
            return Err(BackplaneError::PayloadTooLarge(data.len()));
        }
        Ok(Self {
            destination,
            source,
            command: command as u16,
            sequence,
            data: data.to_vec(),
        })
    }

    /// Builds the answer a module would send back for `request`.
    pub fn response_to(request: &ConfigTelegram, ok: bool, data: &[u8]) -> Self {
        let flag = if ok { RESPONSE_OK } else { RESPONSE_ERROR };
        Self {
            destination: request.source,
            source: request.destination,
            command: (request.command & COMMAND_MASK) | flag,
            sequence: request.sequence,
            data: data.to_vec(),
        }
    }

    pub fn is_ok(&self) -> bool {
        (self.command & RESPONSE_OK) != 0 && (self.command & RESPONSE_ERROR) == 0
    }

    pub fn is_error(&self) -> bool {
        (self.command & RESPONSE_ERROR) != 0
    }

    /// Total encoded length.
    pub fn encoded_len(&self) -> usize {
        TELEGRAM_HEADER_LEN + self.data.len()
    }

    /// Serializes the telegram into `buffer`, returning the number of bytes written.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, BackplaneError> {
        if self.data.len() > C_TEL_MAX_DATA {
            return Err(BackplaneError::PayloadTooLarge(self.data.len()));
        }
        let total = self.encoded_len();
        if buffer.len() < total {
            return Err(BackplaneError::BufferTooShort);
        }
        buffer[0] = self.destination.0;
        buffer[1] = self.source.0;
        buffer[2..4].copy_from_slice(&self.command.to_le_bytes());
        buffer[4..6].copy_from_slice(&self.sequence.to_le_bytes());
        buffer[6..8].copy_from_slice(&(self.data.len() as u16).to_le_bytes());
        buffer[TELEGRAM_HEADER_LEN..total].copy_from_slice(&self.data);
        Ok(total)
    }

    /// Deserializes a telegram from `buffer`.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, BackplaneError> {
        if buffer.len() < TELEGRAM_HEADER_LEN {
            return Err(BackplaneError::BufferTooShort);
        }
        let length = u16::from_le_bytes(buffer[6..8].try_into()?) as usize;
        if length > C_TEL_MAX_DATA {
            return Err(BackplaneError::PayloadTooLarge(length));
        }
        let end = TELEGRAM_HEADER_LEN + length;
        if buffer.len() < end {
            return Err(BackplaneError::BufferTooShort);
        }
        Ok(Self {
            destination: Address(buffer[0]),
            source: Address(buffer[1]),
            command: u16::from_le_bytes(buffer[2..4].try_into()?),
            sequence: u16::from_le_bytes(buffer[4..6].try_into()?),
            data: buffer[TELEGRAM_HEADER_LEN..end].to_vec(),
        })
    }
}
