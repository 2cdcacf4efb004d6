//! Defines the core data structures for diagnostic monitoring.
//!
//! These structs are used to pass data from the real-time bridge thread
//! to the non-real-time monitor thread and are serialized to JSON
//! for the web frontend.

use backplane_rs::{BridgeController, BridgeHal, DeviceEntry, DeviceIndex};
use serde::Serialize;

/// A serializable view of one Device Table row.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub address: u8,
    pub module_type: u16,
    /// Display form of the module type, marked when not connected.
    pub module_name: String,
    pub serial_number: u32,
    pub input_offset: u16,
    pub input_length: u16,
    pub output_offset: u16,
    pub output_length: u16,
    pub active: bool,
    pub connected: bool,
    pub error_count: u8,
}

impl DeviceInfo {
    fn from_entry(index: DeviceIndex, entry: &DeviceEntry) -> Self {
        Self {
            index: index.0,
            address: entry.address.0,
            module_type: entry.identity.module_type.0,
            module_name: entry.identity.module_type.to_string(),
            serial_number: entry.identity.serial_number,
            input_offset: entry.input_offset,
            input_length: entry.identity.input_length,
            output_offset: entry.output_offset,
            output_length: entry.identity.output_length,
            active: entry.active,
            connected: !entry.identity.module_type.is_not_connected(),
            error_count: entry.error_count,
        }
    }
}

/// The main data packet sent from the bridge to the monitor.
/// This contains a complete snapshot of the bridge for a given cycle.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticSnapshot {
    pub bridge_state: String,
    pub scan_state: String,
    /// Raw status byte as written to the process image.
    pub status: u8,
    /// Names of the status flags currently set.
    pub status_flags: Vec<&'static str>,
    pub aggregate_errors: u16,
    pub devices: Vec<DeviceInfo>,
}

impl DiagnosticSnapshot {
    /// Captures the controller's current state.
    ///
    /// Meant to be called from the bridge thread between two cycles.
    pub fn capture<H: BridgeHal>(controller: &BridgeController<H>) -> Self {
        let status = controller.status();
        Self {
            bridge_state: controller.state().to_string(),
            scan_state: controller.scan_state().to_string(),
            status: status.bits(),
            status_flags: status.names().collect(),
            aggregate_errors: controller.control().aggregate_errors(),
            devices: controller
                .table()
                .iter()
                .map(|(index, entry)| DeviceInfo::from_entry(index, entry))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backplane_rs::telegram::ConfigTelegram;
    use backplane_rs::{
        BackplaneError, BridgeConfig, BridgeState, BusTransport, ConfigLoader, DeclaredEntry,
        Delay, DriverRegistry, Indicator, Indicators, LineDirection, ModuleType, ProcessImage,
        Side, SignalProbe,
    };

    /// A backplane with nothing plugged in.
    struct EmptyBackplane;

    impl SignalProbe for EmptyBackplane {
        fn read_sense_line(&mut self, _side: Side) -> bool {
            false
        }
        fn write_config_line(&mut self, _side: Side, _level: bool, _direction: LineDirection) {}
    }

    impl BusTransport for EmptyBackplane {
        fn transfer(
            &mut self,
            _request: &ConfigTelegram,
        ) -> Result<Option<ConfigTelegram>, BackplaneError> {
            Ok(None)
        }
    }

    impl ConfigLoader for EmptyBackplane {
        fn load_declared_configuration(&mut self) -> Result<Vec<DeclaredEntry>, BackplaneError> {
            Ok(Vec::new())
        }
    }

    impl DriverRegistry for EmptyBackplane {
        fn start_driver(&mut self, _module_type: ModuleType, _index: DeviceIndex) -> bool {
            false
        }
        fn cyclic_exchange(
            &mut self,
            _index: DeviceIndex,
            _device: &DeviceEntry,
            _image: &mut ProcessImage,
        ) -> Result<(), BackplaneError> {
            Ok(())
        }
    }

    impl Indicators for EmptyBackplane {
        fn set_indicator(&mut self, _indicator: Indicator, _level: bool) {}
    }

    impl Delay for EmptyBackplane {
        fn delay_ms(&mut self, _ms: u32) {}
    }

    fn running_controller() -> BridgeController<EmptyBackplane> {
        let mut controller =
            BridgeController::new(EmptyBackplane, BridgeConfig::default()).unwrap();
        let mut now_us = 0;
        while controller.run_cycle(now_us) != BridgeState::Running {
            now_us += 1_000;
            assert!(now_us < 1_000_000, "bridge never reached Running");
        }
        controller
    }

    #[test]
    fn test_capture_before_scan() {
        let controller = BridgeController::new(EmptyBackplane, BridgeConfig::default()).unwrap();
        let snapshot = DiagnosticSnapshot::capture(&controller);
        assert_eq!(snapshot.bridge_state, BridgeState::Initializing.to_string());
        assert_eq!(snapshot.status, 0);
        assert!(snapshot.status_flags.is_empty());
        assert_eq!(snapshot.devices.len(), 1);
        assert_eq!(snapshot.devices[0].module_type, ModuleType::CORE.0);
    }

    #[test]
    fn test_capture_running_bridge() {
        let controller = running_controller();
        let snapshot = DiagnosticSnapshot::capture(&controller);
        assert_eq!(snapshot.bridge_state, BridgeState::Running.to_string());
        assert_eq!(snapshot.status_flags, ["running"]);
        assert_eq!(snapshot.aggregate_errors, 0);
        let core = &snapshot.devices[0];
        assert!(core.active && core.connected);
        assert_eq!((core.input_offset, core.output_offset), (0, 6));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = DiagnosticSnapshot::capture(&running_controller());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], 1);
        assert_eq!(json["devices"][0]["address"], 0);
        assert_eq!(json["status_flags"][0], "running");
    }
}
