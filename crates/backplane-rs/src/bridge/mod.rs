//! Lifecycle control of the backplane: scan, reconcile, dispatch, stop and reset.

pub mod control;
pub mod controller;
pub mod state;

pub use control::{BridgeControl, MaintenanceAction};
pub use controller::BridgeController;
pub use state::BridgeState;
