//! The in-memory registry of discovered and declared modules.

pub mod identity;
pub mod table;

pub use identity::{IDENTITY_LEN, Identity};
pub use table::{DeclaredEntry, DeviceEntry, DeviceIndex, DeviceTable};
