// crates/backplane-rs/src/process_image.rs
//! The shared process image and the core device's status block inside it.

use crate::hal::BackplaneError;
use alloc::vec;
use alloc::vec::Vec;
use core::ops::BitOr;

// --- Core device input block ---

/// Aggregate status bitfield (`StatusFlags`).
pub const CORE_IN_STATUS: usize = 0;
/// Duration of the last I/O cycle in milliseconds.
pub const CORE_IN_IO_CYCLE: usize = 1;
/// Sum of all device error counters, u16 little-endian.
pub const CORE_IN_ERROR_COUNT: usize = 2;
pub const CORE_IN_TEMPERATURE: usize = 4;
pub const CORE_IN_FREQUENCY: usize = 5;
/// Length of the core input block.
pub const CORE_INPUT_LEN: u16 = 6;

// --- Core device output block ---

/// LED state bits written by the application.
pub const CORE_OUT_LED: usize = 0;
/// Lower error threshold, u16 little-endian. 0 disables the check.
pub const CORE_OUT_ERROR_LIMIT_1: usize = 1;
/// Upper error threshold, u16 little-endian. 0 disables the check.
pub const CORE_OUT_ERROR_LIMIT_2: usize = 3;
/// Length of the core output block.
pub const CORE_OUTPUT_LEN: u16 = 5;

/// The aggregate status bitfield exposed to applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    // --- Flag Constants ---
    pub const RUNNING: Self = Self(1 << 0);
    pub const EXTRA_MODULE: Self = Self(1 << 1);
    pub const MISSING_MODULE: Self = Self(1 << 2);
    pub const SIZE_MISMATCH: Self = Self(1 << 3);
    pub const LEFT_GATEWAY: Self = Self(1 << 4);
    pub const RIGHT_GATEWAY: Self = Self(1 << 5);

    /// Every bit derived from reconciling scan results with the declared configuration.
    pub const CONFIGURATION_BITS: Self =
        Self(Self::EXTRA_MODULE.0 | Self::MISSING_MODULE.0 | Self::SIZE_MISMATCH.0);

    /// Every bit derived from the gateway bookkeeping of the dispatcher.
    pub const GATEWAY_BITS: Self = Self(Self::LEFT_GATEWAY.0 | Self::RIGHT_GATEWAY.0);

    // --- Methods ---

    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0x3F)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Checks if all of the specified flags are set.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Names of the flags currently set, in bit order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        const NAMES: [(StatusFlags, &str); 6] = [
            (StatusFlags::RUNNING, "running"),
            (StatusFlags::EXTRA_MODULE, "extra_module"),
            (StatusFlags::MISSING_MODULE, "missing_module"),
            (StatusFlags::SIZE_MISMATCH, "size_mismatch"),
            (StatusFlags::LEFT_GATEWAY, "left_gateway"),
            (StatusFlags::RIGHT_GATEWAY, "right_gateway"),
        ];
        NAMES
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

impl BitOr for StatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// The shared memory region exposing module I/O data and status.
#[derive(Debug, Clone)]
pub struct ProcessImage {
    data: Vec<u8>,
}

impl ProcessImage {
    /// Creates a zeroed image of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Zeroes the whole image.
    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|b| *b = 0);
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), BackplaneError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(BackplaneError::OutOfImage { offset, len }),
        }
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8], BackplaneError> {
        self.check(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], BackplaneError> {
        self.check(offset, len)?;
        Ok(&mut self.data[offset..offset + len])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, BackplaneError> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<(), BackplaneError> {
        self.check(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, BackplaneError> {
        self.check(offset, 2)?;
        Ok(u16::from_le_bytes(self.data[offset..offset + 2].try_into()?))
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<(), BackplaneError> {
        self.check(offset, 2)?;
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

/// Location of the core device's status blocks inside the process image.
///
/// Anchored by the reconciler to the core row's offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreImage {
    pub input_offset: usize,
    pub output_offset: usize,
}

impl CoreImage {
    pub fn new(input_offset: u16, output_offset: u16) -> Self {
        Self {
            input_offset: input_offset as usize,
            output_offset: output_offset as usize,
        }
    }

    pub fn write_status(&self, image: &mut ProcessImage, status: StatusFlags) -> Result<(), BackplaneError> {
        image.write_u8(self.input_offset + CORE_IN_STATUS, status.bits())
    }

    pub fn read_status(&self, image: &ProcessImage) -> Result<StatusFlags, BackplaneError> {
        image
            .read_u8(self.input_offset + CORE_IN_STATUS)
            .map(StatusFlags::from_bits_truncate)
    }

    pub fn write_io_cycle(&self, image: &mut ProcessImage, cycle_ms: u8) -> Result<(), BackplaneError> {
        image.write_u8(self.input_offset + CORE_IN_IO_CYCLE, cycle_ms)
    }

    pub fn write_error_count(&self, image: &mut ProcessImage, count: u16) -> Result<(), BackplaneError> {
        image.write_u16(self.input_offset + CORE_IN_ERROR_COUNT, count)
    }

    pub fn read_error_count(&self, image: &ProcessImage) -> Result<u16, BackplaneError> {
        image.read_u16(self.input_offset + CORE_IN_ERROR_COUNT)
    }

    pub fn read_led(&self, image: &ProcessImage) -> Result<u8, BackplaneError> {
        image.read_u8(self.output_offset + CORE_OUT_LED)
    }

    /// Returns the (lower, upper) error thresholds.
    pub fn read_error_limits(&self, image: &ProcessImage) -> Result<(u16, u16), BackplaneError> {
        Ok((
            image.read_u16(self.output_offset + CORE_OUT_ERROR_LIMIT_1)?,
            image.read_u16(self.output_offset + CORE_OUT_ERROR_LIMIT_2)?,
        ))
    }

    pub fn write_error_limits(
        &self,
        image: &mut ProcessImage,
        lower: u16,
        upper: u16,
    ) -> Result<(), BackplaneError> {
        image.write_u16(self.output_offset + CORE_OUT_ERROR_LIMIT_1, lower)?;
        image.write_u16(self.output_offset + CORE_OUT_ERROR_LIMIT_2, upper)
    }
}
