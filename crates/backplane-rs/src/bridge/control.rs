// crates/backplane-rs/src/bridge/control.rs
use super::state::BridgeState;
use crate::hal::BackplaneError;
use crate::process_image::StatusFlags;
use crate::telegram::BusCommand;
use crate::types::Address;
use alloc::vec::Vec;
use log::info;
use spin::{Mutex, MutexGuard};

/// A one-shot maintenance command, executed while the bridge is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    FirmwareUpdateMode(Address),
    WriteSerialNumber { address: Address, serial_number: u32 },
    ForceReset(Address),
}

impl MaintenanceAction {
    pub fn address(&self) -> Address {
        match *self {
            Self::FirmwareUpdateMode(address)
            | Self::WriteSerialNumber { address, .. }
            | Self::ForceReset(address) => address,
        }
    }

    pub fn command(&self) -> BusCommand {
        match self {
            Self::FirmwareUpdateMode(_) => BusCommand::SetFirmwareUpdateMode,
            Self::WriteSerialNumber { .. } => BusCommand::WriteSerialNumber,
            Self::ForceReset(_) => BusCommand::ForceReset,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::WriteSerialNumber { serial_number, .. } => serial_number.to_le_bytes().to_vec(),
            Self::FirmwareUpdateMode(_) | Self::ForceReset(_) => Vec::new(),
        }
    }
}

/// State shared between the cycle owner and other execution contexts.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub state: BridgeState,
    pub status: StatusFlags,
    pub aggregate_errors: u16,
    pub pending_action: Option<MaintenanceAction>,
    pub reset_requested: bool,
}

/// Cross-context handle to a running `BridgeController`.
///
/// Every accessor takes the bridge lock, which the controller holds for a
/// whole cycle. Calls may therefore spin until the current cycle finishes,
/// and must not be made from HAL callbacks running inside that cycle.
#[derive(Debug)]
pub struct BridgeControl {
    shared: Mutex<SharedState>,
}

impl BridgeControl {
    pub(crate) fn new(state: BridgeState) -> Self {
        Self {
            shared: Mutex::new(SharedState {
                state,
                ..SharedState::default()
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock()
    }

    /// True while a cycle or another context holds the bridge lock.
    pub fn is_locked(&self) -> bool {
        self.shared.is_locked()
    }

    pub fn state(&self) -> BridgeState {
        self.lock().state
    }

    pub fn status(&self) -> StatusFlags {
        self.lock().status
    }

    /// Aggregate bus error count of the last dispatch cycle.
    pub fn aggregate_errors(&self) -> u16 {
        self.lock().aggregate_errors
    }

    /// Forces the bridge into `Stopped`. It stays there until reset.
    pub fn stop(&self) {
        let mut shared = self.lock();
        if shared.state != BridgeState::Stopped {
            info!("[Bridge] Stop requested in state {}.", shared.state);
            shared.state = BridgeState::Stopped;
        }
    }

    /// Asks the controller to re-initialize at the start of its next cycle.
    pub fn request_reset(&self) {
        self.lock().reset_requested = true;
    }

    pub fn reset_pending(&self) -> bool {
        self.lock().reset_requested
    }

    /// The maintenance action waiting for the bridge to stop, if any.
    pub fn pending_action(&self) -> Option<MaintenanceAction> {
        self.lock().pending_action
    }

    /// Queues a maintenance action. Only one action can wait at a time.
    pub fn request_maintenance(&self, action: MaintenanceAction) -> Result<(), BackplaneError> {
        let mut shared = self.lock();
        if shared.pending_action.is_some() {
            return Err(BackplaneError::Busy);
        }
        info!("[Bridge] Queued maintenance action {:?}.", action);
        shared.pending_action = Some(action);
        Ok(())
    }

    /// Queues "enter firmware-update mode" for `address`.
    pub fn request_firmware_update_mode(&self, address: Address) -> Result<(), BackplaneError> {
        self.request_maintenance(MaintenanceAction::FirmwareUpdateMode(address))
    }

    /// Queues programming a new serial number into the module at `address`.
    pub fn request_serial_number_write(
        &self,
        address: Address,
        serial_number: u32,
    ) -> Result<(), BackplaneError> {
        self.request_maintenance(MaintenanceAction::WriteSerialNumber {
            address,
            serial_number,
        })
    }

    /// Queues a firmware reset of the module at `address`.
    pub fn request_force_reset(&self, address: Address) -> Result<(), BackplaneError> {
        self.request_maintenance(MaintenanceAction::ForceReset(address))
    }
}
