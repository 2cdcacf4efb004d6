// crates/backplane-rs-config/src/model.rs

//! Serde model of the JSON configuration document.
//!
//! ```json
//! {
//!   "bridge": { "rightBase": 32, "autoStart": true },
//!   "devices": [
//!     { "address": 32, "moduleType": 96, "inputLength": 2, "outputLength": 2,
//!       "inputOffset": 16, "outputOffset": 18 }
//!   ]
//! }
//! ```

use alloc::vec::Vec;
use backplane_rs::{Address, BridgeConfig, DeclaredEntry, ModuleType};
use serde::{Deserialize, Serialize};

/// The complete configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub devices: Vec<DeviceDeclaration>,
}

impl ConfigDocument {
    /// The declared entries in document order.
    pub fn declared(&self) -> Vec<DeclaredEntry> {
        self.devices.iter().map(DeclaredEntry::from).collect()
    }

    /// `BridgeConfig::default()` with this document's overrides applied.
    pub fn bridge_config(&self) -> BridgeConfig {
        self.bridge.apply(BridgeConfig::default())
    }
}

/// Optional overrides of `BridgeConfig`. Absent keys keep the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_base: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_limit: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_devices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_serial_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<TimingsSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_pulse_us: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_settle_us: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_enable_dwell_us: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_settle_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_exchange_start_ms: Option<u32>,
}

impl BridgeSection {
    pub fn apply(&self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(base) = self.right_base {
            config.right_base = Address(base);
        }
        if let Some(limit) = self.retry_limit {
            config.retry_limit = limit;
        }
        if let Some(max) = self.max_devices {
            config.max_devices = max;
        }
        if let Some(size) = self.image_size {
            config.image_size = size;
        }
        if let Some(auto_start) = self.auto_start {
            config.auto_start = auto_start;
        }
        if let Some(serial) = self.core_serial_number {
            config.core_serial_number = serial;
        }
        if let Some(t) = self.timings {
            let timings = &mut config.timings;
            timings.presence_pulse_us = t.presence_pulse_us.unwrap_or(timings.presence_pulse_us);
            timings.presence_settle_us = t.presence_settle_us.unwrap_or(timings.presence_settle_us);
            timings.config_enable_dwell_us = t
                .config_enable_dwell_us
                .unwrap_or(timings.config_enable_dwell_us);
            timings.handshake_settle_ms =
                t.handshake_settle_ms.unwrap_or(timings.handshake_settle_ms);
            timings.data_exchange_start_ms = t
                .data_exchange_start_ms
                .unwrap_or(timings.data_exchange_start_ms);
        }
        config
    }
}

/// One expected module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDeclaration {
    pub address: u8,
    pub module_type: u16,
    pub input_length: u16,
    pub output_length: u16,
    #[serde(default)]
    pub config_length: u16,
    #[serde(default)]
    pub base_offset: u16,
    #[serde(default)]
    pub input_offset: u16,
    #[serde(default)]
    pub output_offset: u16,
    #[serde(default)]
    pub config_offset: u16,
    /// 0 when the serial number is not known in advance.
    #[serde(default)]
    pub serial_number: u32,
}

impl From<&DeviceDeclaration> for DeclaredEntry {
    fn from(d: &DeviceDeclaration) -> Self {
        DeclaredEntry {
            address: Address(d.address),
            module_type: ModuleType(d.module_type),
            input_length: d.input_length,
            output_length: d.output_length,
            config_length: d.config_length,
            base_offset: d.base_offset,
            input_offset: d.input_offset,
            output_offset: d.output_offset,
            config_offset: d.config_offset,
            serial_number: d.serial_number,
        }
    }
}

impl From<&DeclaredEntry> for DeviceDeclaration {
    fn from(e: &DeclaredEntry) -> Self {
        DeviceDeclaration {
            address: e.address.0,
            module_type: e.module_type.0,
            input_length: e.input_length,
            output_length: e.output_length,
            config_length: e.config_length,
            base_offset: e.base_offset,
            input_offset: e.input_offset,
            output_offset: e.output_offset,
            config_offset: e.config_offset,
            serial_number: e.serial_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_use_defaults() {
        let doc: ConfigDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.devices.is_empty());
        assert_eq!(doc.bridge_config(), BridgeConfig::default());
    }

    #[test]
    fn test_bridge_overrides() {
        let doc: ConfigDocument = serde_json::from_str(
            r#"{ "bridge": { "rightBase": 40, "autoStart": false,
                             "timings": { "handshakeSettleMs": 2 } } }"#,
        )
        .unwrap();
        let config = doc.bridge_config();
        assert_eq!(config.right_base, Address(40));
        assert!(!config.auto_start);
        assert_eq!(config.timings.handshake_settle_ms, 2);
        assert_eq!(
            config.timings.presence_pulse_us,
            BridgeConfig::default().timings.presence_pulse_us
        );
    }

    #[test]
    fn test_device_optional_fields() {
        let device: DeviceDeclaration = serde_json::from_str(
            r#"{ "address": 33, "moduleType": 97, "inputLength": 1, "outputLength": 0 }"#,
        )
        .unwrap();
        let entry = DeclaredEntry::from(&device);
        assert_eq!(entry.module_type, ModuleType::DI);
        assert_eq!(entry.input_offset, 0);
        assert_eq!(entry.serial_number, 0);
    }
}
