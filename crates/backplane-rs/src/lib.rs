#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' provides the Device Table, telegram payloads and the process image.
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod config;

// --- Bus and Data Model ---
pub mod telegram;
pub mod bus;
pub mod device;
pub mod process_image;

// --- Topology and Cyclic Exchange ---
pub mod scan;
pub mod reconcile;
pub mod dispatch;
pub mod bridge;

// --- Top-level Exports ---
pub use types::{Address, ModuleType, Side};
pub use hal::{
    BackplaneError, BridgeHal, BusTransport, ConfigLoader, Delay, DriverRegistry, Indicator,
    Indicators, LineDirection, SignalProbe,
};
pub use config::{BridgeConfig, ScanTimings};
pub use device::{DeclaredEntry, DeviceEntry, DeviceIndex, DeviceTable, Identity};
pub use process_image::{CoreImage, ProcessImage, StatusFlags};
pub use scan::{ScanState, Scanner};
pub use reconcile::{ConfigMismatch, MismatchKind, ReconcileIssue, ReconcileReport, reconcile};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use bridge::{BridgeControl, BridgeController, BridgeState, MaintenanceAction};
