// crates/backplane-rs-config/src/validation.rs

use crate::error::ConfigError;
use crate::model::ConfigDocument;
use alloc::vec::Vec;
use backplane_rs::{Address, DeclaredEntry};
use log::error;

/// Checks a parsed document before it is handed to the core.
///
/// Address uniqueness, image bounds and region overlap are checked on the
/// declared list; the bridge overrides go through `BridgeConfig::validate`.
pub fn validate_document(document: &ConfigDocument) -> Result<(), ConfigError> {
    let bridge = document.bridge_config();
    bridge.validate()?;
    validate_declared(&document.declared(), bridge.image_size)
}

/// Checks a declared list against a process image of `image_size` bytes.
pub fn validate_declared(declared: &[DeclaredEntry], image_size: usize) -> Result<(), ConfigError> {
    let mut seen: Vec<Address> = Vec::with_capacity(declared.len());
    for entry in declared {
        if entry.address.is_broadcast() {
            error!("[Config] Declared module uses the broadcast address.");
            return Err(ConfigError::ReservedAddress(entry.address.0));
        }
        if seen.contains(&entry.address) {
            error!("[Config] Address {} declared more than once.", entry.address.0);
            return Err(ConfigError::DuplicateAddress(entry.address.0));
        }
        seen.push(entry.address);

        if let Some((_, end)) = regions(entry).find(|(_, end)| *end as usize > image_size) {
            error!(
                "[Config] Module {} ends at byte {}, past the {}-byte image.",
                entry.address.0, end, image_size
            );
            return Err(ConfigError::OutOfImage {
                address: entry.address.0,
                end,
                image_size,
            });
        }
    }

    for (i, a) in declared.iter().enumerate() {
        for b in &declared[i + 1..] {
            if regions(a).any(|ra| regions(b).any(|rb| intersects(ra, rb))) {
                error!(
                    "[Config] Modules {} and {} overlap in the process image.",
                    a.address.0, b.address.0
                );
                return Err(ConfigError::OverlappingRegions {
                    first: a.address.0,
                    second: b.address.0,
                });
            }
        }
    }
    Ok(())
}

/// Non-empty `(start, end)` regions of one entry.
fn regions(entry: &DeclaredEntry) -> impl Iterator<Item = (u32, u32)> {
    [
        (entry.input_offset, entry.input_length),
        (entry.output_offset, entry.output_length),
        (entry.config_offset, entry.config_length),
    ]
    .into_iter()
    .filter(|(_, len)| *len > 0)
    .map(|(offset, len)| (offset as u32, offset as u32 + len as u32))
}

fn intersects(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
