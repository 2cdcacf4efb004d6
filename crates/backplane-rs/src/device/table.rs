// crates/backplane-rs/src/device/table.rs
use super::identity::Identity;
use crate::hal::BackplaneError;
use crate::types::{Address, ModuleType};
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;
use log::{debug, error};

/// Typed handle to a row of the `DeviceTable`.
///
/// Handles stay valid until the next table reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceIndex(pub usize);

impl DeviceIndex {
    /// The core device is always the first row.
    pub const CORE: Self = Self(0);
}

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One expected module as supplied by the configuration loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeclaredEntry {
    pub address: Address,
    pub module_type: ModuleType,
    pub input_length: u16,
    pub output_length: u16,
    pub config_length: u16,
    /// Start of this module's block in the process image.
    pub base_offset: u16,
    pub input_offset: u16,
    pub output_offset: u16,
    pub config_offset: u16,
    /// Serial number of the expected module, 0 if not known.
    pub serial_number: u32,
}

impl DeclaredEntry {
    /// Identity fields carried by a declared row when no module answered for it.
    pub fn identity(&self) -> Identity {
        Identity {
            serial_number: self.serial_number,
            module_type: self.module_type,
            input_length: self.input_length,
            output_length: self.output_length,
            ..Identity::default()
        }
    }
}

/// A single row of the Device Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    pub address: Address,
    pub identity: Identity,
    pub input_offset: u16,
    pub output_offset: u16,
    pub config_offset: u16,
    pub config_length: u16,
    /// Inactive rows are kept for status reporting but never polled.
    pub active: bool,
    /// Consecutive failed cyclic exchanges, saturating at 255.
    pub error_count: u8,
}

impl DeviceEntry {
    pub fn new(address: Address, identity: Identity) -> Self {
        Self {
            address,
            identity,
            input_offset: 0,
            output_offset: 0,
            config_offset: 0,
            config_length: 0,
            active: true,
            error_count: 0,
        }
    }

    /// Byte range of this device's inputs in the process image.
    pub fn input_range(&self) -> Range<usize> {
        let start = self.input_offset as usize;
        start..start + self.identity.input_length as usize
    }

    /// Byte range of this device's outputs in the process image.
    pub fn output_range(&self) -> Range<usize> {
        let start = self.output_offset as usize;
        start..start + self.identity.output_length as usize
    }

    /// Byte range of this device's configuration block in the process image.
    pub fn config_range(&self) -> Range<usize> {
        let start = self.config_offset as usize;
        start..start + self.config_length as usize
    }

    /// Returns true if every non-empty block ends inside an image of `image_size` bytes.
    pub fn fits_image(&self, image_size: usize) -> bool {
        [self.input_range(), self.output_range(), self.config_range()]
            .iter()
            .all(|range| range.is_empty() || range.end <= image_size)
    }

    /// Counts a failed exchange.
    pub fn record_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Clears the consecutive error counter after a good exchange.
    pub fn clear_errors(&mut self) {
        self.error_count = 0;
    }
}

/// Registry of discovered and declared modules.
///
/// Rows keep insertion order: core first, then the right side in ascending
/// address order, the left side in descending order, and finally any rows
/// appended by the reconciler.
#[derive(Debug, Clone)]
pub struct DeviceTable {
    entries: Vec<DeviceEntry>,
    capacity: usize,
    /// Number of rows the scan produced, fixed by the first reconciliation.
    scanned_len: Option<usize>,
}

impl DeviceTable {
    /// Creates a table holding only the core device.
    pub fn new(capacity: usize, core_identity: Identity) -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            scanned_len: None,
        };
        table.reset(core_identity);
        table
    }

    /// Clears the table down to the single core entry at address 0.
    pub fn reset(&mut self, core_identity: Identity) {
        self.entries.clear();
        self.entries.push(DeviceEntry::new(Address::CORE, core_identity));
        self.scanned_len = None;
        debug!("[Table] Reset to core entry.");
    }

    /// Appends a new row and returns its handle.
    ///
    /// No validation beyond capacity; callers keep addresses unique.
    pub fn append(
        &mut self,
        address: Address,
        identity: Identity,
    ) -> Result<DeviceIndex, BackplaneError> {
        if self.entries.len() >= self.capacity {
            error!(
                "[Table] Cannot append address {}: table full ({} rows).",
                address, self.capacity
            );
            return Err(BackplaneError::TableFull);
        }
        let index = DeviceIndex(self.entries.len());
        self.entries.push(DeviceEntry::new(address, identity));
        Ok(index)
    }

    pub fn get(&self, index: DeviceIndex) -> Option<&DeviceEntry> {
        self.entries.get(index.0)
    }

    pub fn get_mut(&mut self, index: DeviceIndex) -> Option<&mut DeviceEntry> {
        self.entries.get_mut(index.0)
    }

    /// The core device row.
    pub fn core(&self) -> &DeviceEntry {
        // Row 0 is created by `reset` and never removed.
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false, the core row is never removed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates rows in insertion order together with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceIndex, &DeviceEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (DeviceIndex(i), entry))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (DeviceIndex, &mut DeviceEntry)> {
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(i, entry)| (DeviceIndex(i), entry))
    }

    /// Finds the first row with the given address.
    pub fn find_by_address(&self, address: Address) -> Option<DeviceIndex> {
        self.entries
            .iter()
            .position(|entry| entry.address == address)
            .map(DeviceIndex)
    }

    /// Drops every row at or after `len`. The core row always survives.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len.max(1));
    }

    /// Fixes the current length as the end of the scanned rows, once per scan.
    ///
    /// Returns the scanned length. Later calls return the first value until
    /// the next `reset`.
    pub(crate) fn seal_scanned(&mut self) -> usize {
        *self.scanned_len.get_or_insert(self.entries.len())
    }

    /// Number of rows found by the scan, once the table has been reconciled.
    pub fn scanned_len(&self) -> Option<usize> {
        self.scanned_len
    }

    /// Sum of all per-device error counters.
    pub fn aggregate_errors(&self) -> u32 {
        self.entries.iter().map(|e| e.error_count as u32).sum()
    }

    /// Verifies that no two active rows share process image bytes.
    ///
    /// Returns the first overlapping pair found.
    pub fn check_layout(&self) -> Result<(), (DeviceIndex, DeviceIndex)> {
        let active: Vec<(DeviceIndex, &DeviceEntry)> =
            self.iter().filter(|(_, e)| e.active).collect();
        for (i, (idx_a, a)) in active.iter().enumerate() {
            for (idx_b, b) in active.iter().skip(i + 1) {
                let regions_a = [a.input_range(), a.output_range()];
                let regions_b = [b.input_range(), b.output_range()];
                let overlaps = regions_a.iter().any(|ra| {
                    regions_b
                        .iter()
                        .any(|rb| !ra.is_empty() && !rb.is_empty() && ra.start < rb.end && rb.start < ra.end)
                });
                if overlaps {
                    return Err((*idx_a, *idx_b));
                }
            }
        }
        Ok(())
    }
}
