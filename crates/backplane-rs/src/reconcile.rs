// crates/backplane-rs/src/reconcile.rs
//! Matches the scanned Device Table against the declared configuration and
//! lays out the process image.

use crate::device::{DeclaredEntry, DeviceEntry, DeviceIndex, DeviceTable};
use crate::process_image::{CoreImage, StatusFlags};
use crate::types::Address;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use log::{error, info, warn};

/// Which identity field disagreed with the declared entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    ModuleType,
    InputLength,
    OutputLength,
}

/// A scanned module that answered at a declared address but does not fit the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigMismatch {
    pub index: DeviceIndex,
    pub address: Address,
    pub kind: MismatchKind,
    pub expected: u16,
    pub found: u16,
}

impl fmt::Display for ConfigMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            MismatchKind::ModuleType => "module type",
            MismatchKind::InputLength => "input length",
            MismatchKind::OutputLength => "output length",
        };
        write!(
            f,
            "wrong {} at address {}: expected {}, found {}",
            what, self.address, self.expected, self.found
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileIssue {
    Mismatch(ConfigMismatch),
    /// Two active rows share process image bytes.
    Overlap(DeviceIndex, DeviceIndex),
    /// A row's blocks end past the process image. Module rows are
    /// deactivated, the core is moved back to the start of the image.
    OutOfImage(DeviceIndex),
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Rows matched against a declared entry, core included.
    pub matched: usize,
    /// Scanned rows without a usable declared entry.
    pub extra: usize,
    /// Declared entries appended as not-connected rows.
    pub missing: usize,
    pub issues: Vec<ReconcileIssue>,
    /// Location of the core status blocks.
    pub core: CoreImage,
}

impl ReconcileReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &ConfigMismatch> {
        self.issues.iter().filter_map(|issue| match issue {
            ReconcileIssue::Mismatch(m) => Some(m),
            _ => None,
        })
    }

    /// Rows whose layout did not fit the process image.
    pub fn out_of_image(&self) -> impl Iterator<Item = DeviceIndex> + '_ {
        self.issues.iter().filter_map(|issue| match issue {
            ReconcileIssue::OutOfImage(index) => Some(*index),
            _ => None,
        })
    }

    pub fn has_overlap(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, ReconcileIssue::Overlap(..)))
    }
}

/// Reconciles the scanned rows of `table` with `declared`.
///
/// Rows appended by an earlier run are dropped first, so calling this twice
/// on the same scan gives the same table, flags and report. An empty
/// `declared` list selects a packed automatic layout with every row active.
///
/// Active rows whose blocks do not fit into `image_size` bytes are
/// deactivated and raise `SIZE_MISMATCH`.
pub fn reconcile(
    table: &mut DeviceTable,
    declared: &[DeclaredEntry],
    image_size: usize,
    status: &mut StatusFlags,
) -> ReconcileReport {
    status.remove(StatusFlags::CONFIGURATION_BITS);
    drop_declared_rows(table);
    for (_, entry) in table.iter_mut() {
        entry.active = true;
        entry.input_offset = 0;
        entry.output_offset = 0;
        entry.config_offset = 0;
        entry.config_length = 0;
    }

    let mut report = if declared.is_empty() {
        info!("[Reconcile] No declared configuration, using automatic layout.");
        auto_layout(table)
    } else {
        match_declared(table, declared, status)
    };

    check_image_bounds(table, image_size, status, &mut report);

    if let Err((a, b)) = table.check_layout() {
        error!("[Reconcile] Rows {} and {} overlap in the process image.", a, b);
        report.issues.push(ReconcileIssue::Overlap(a, b));
    }

    info!(
        "[Reconcile] {} matched, {} extra, {} missing, status {:#04x}.",
        report.matched,
        report.extra,
        report.missing,
        status.bits()
    );
    report
}

/// Removes the not-connected rows a previous run appended after the scanned rows.
fn drop_declared_rows(table: &mut DeviceTable) {
    let scanned = table.seal_scanned();
    table.truncate(scanned);
}

fn check_image_bounds(
    table: &mut DeviceTable,
    image_size: usize,
    status: &mut StatusFlags,
    report: &mut ReconcileReport,
) {
    for (index, entry) in table.iter_mut() {
        if !entry.active || entry.fits_image(image_size) {
            continue;
        }
        report.issues.push(ReconcileIssue::OutOfImage(index));
        if index == DeviceIndex::CORE {
            error!(
                "[Reconcile] Core blocks at {}/{} exceed the {}-byte image, anchoring at offset 0.",
                entry.input_offset, entry.output_offset, image_size
            );
            entry.input_offset = 0;
            entry.output_offset = entry.identity.input_length;
            report.core = CoreImage::new(entry.input_offset, entry.output_offset);
            continue;
        }
        error!(
            "[Reconcile] Module at {} does not fit the {}-byte image, deactivating.",
            entry.address, image_size
        );
        entry.active = false;
        status.insert(StatusFlags::SIZE_MISMATCH);
    }
}

fn auto_layout(table: &mut DeviceTable) -> ReconcileReport {
    let mut cursor: u16 = 0;
    for (_, entry) in table.iter_mut() {
        entry.input_offset = cursor;
        cursor = cursor.saturating_add(entry.identity.input_length);
        entry.output_offset = cursor;
        cursor = cursor.saturating_add(entry.identity.output_length);
    }
    let core = table.core();
    ReconcileReport {
        matched: 0,
        extra: 0,
        missing: 0,
        issues: Vec::new(),
        core: CoreImage::new(core.input_offset, core.output_offset),
    }
}

fn first_mismatch(entry: &DeviceEntry, declared: &DeclaredEntry) -> Option<(MismatchKind, u16, u16)> {
    let found = &entry.identity;
    if found.module_type != declared.module_type {
        Some((MismatchKind::ModuleType, declared.module_type.0, found.module_type.0))
    } else if found.input_length != declared.input_length {
        Some((MismatchKind::InputLength, declared.input_length, found.input_length))
    } else if found.output_length != declared.output_length {
        Some((MismatchKind::OutputLength, declared.output_length, found.output_length))
    } else {
        None
    }
}

fn match_declared(
    table: &mut DeviceTable,
    declared: &[DeclaredEntry],
    status: &mut StatusFlags,
) -> ReconcileReport {
    let mut consumed = vec![false; declared.len()];
    let mut report = ReconcileReport::default();

    for (index, entry) in table.iter_mut() {
        let Some(pos) = declared.iter().position(|d| d.address == entry.address) else {
            if index == DeviceIndex::CORE {
                // The core keeps its status blocks at the start of the image.
                warn!("[Reconcile] No declared entry for the core, anchoring at offset 0.");
                entry.output_offset = entry.identity.input_length;
                continue;
            }
            warn!(
                "[Reconcile] Module {} at {} is not declared.",
                entry.identity.module_type, entry.address
            );
            entry.active = false;
            status.insert(StatusFlags::EXTRA_MODULE);
            report.extra += 1;
            continue;
        };
        let wanted = &declared[pos];

        // The core identity is synthesized locally, only the address matters.
        if index != DeviceIndex::CORE {
            if let Some((kind, expected, found)) = first_mismatch(entry, wanted) {
                let mismatch = ConfigMismatch {
                    index,
                    address: entry.address,
                    kind,
                    expected,
                    found,
                };
                warn!("[Reconcile] {}", mismatch);
                entry.active = false;
                status.insert(StatusFlags::SIZE_MISMATCH | StatusFlags::EXTRA_MODULE);
                report.issues.push(ReconcileIssue::Mismatch(mismatch));
                report.extra += 1;
                continue;
            }
        }

        entry.input_offset = wanted.input_offset;
        entry.output_offset = wanted.output_offset;
        entry.config_offset = wanted.config_offset;
        entry.config_length = wanted.config_length;
        consumed[pos] = true;
        report.matched += 1;
    }

    let core = table.core();
    report.core = CoreImage::new(core.input_offset, core.output_offset);

    for (wanted, _) in declared.iter().zip(&consumed).filter(|(_, used)| !**used) {
        warn!(
            "[Reconcile] Declared module {} at {} is missing.",
            wanted.module_type, wanted.address
        );
        status.insert(StatusFlags::MISSING_MODULE);
        report.missing += 1;

        let mut identity = wanted.identity();
        identity.module_type = wanted.module_type.not_connected();
        match table.append(wanted.address, identity) {
            Ok(index) => {
                if let Some(row) = table.get_mut(index) {
                    row.input_offset = wanted.input_offset;
                    row.output_offset = wanted.output_offset;
                    row.config_offset = wanted.config_offset;
                    row.config_length = wanted.config_length;
                    row.active = false;
                }
            }
            Err(e) => error!(
                "[Reconcile] Cannot record missing module at {}: {}",
                wanted.address, e
            ),
        }
    }

    report
}
