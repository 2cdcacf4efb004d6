// crates/backplane-rs/src/config.rs
//! Static parameters of a bridge controller instance.

use crate::device::Identity;
use crate::hal::BackplaneError;
use crate::process_image::{CORE_INPUT_LEN, CORE_OUTPUT_LEN};
use crate::types::{
    Address, C_ADR_BROADCAST, C_ADR_LEFT_MIN, C_ADR_RIGHT_BASE_DEF, C_DEV_MAX_DEF,
    C_IMAGE_SIZE_DEF, ModuleType,
};
use log::error;

/// Default number of failed handshakes tolerated per address.
pub const C_SCAN_RETRY_LIMIT_DEF: u8 = 5;

/// Timing parameters of the topology scan.
///
/// Pulse, settle and dwell times are polled against the cycle clock (µs).
/// The two `_ms` values are blocking delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTimings {
    /// How long both config lines are held high during presence signalling.
    pub presence_pulse_us: u64,
    /// Settle time after the presence pulse is released.
    pub presence_settle_us: u64,
    /// Dwell after asserting a side's config-enable line.
    pub config_enable_dwell_us: u64,
    /// Blocking pause between the three handshake exchanges.
    pub handshake_settle_ms: u32,
    /// Blocking pause after broadcasting the start of data exchange.
    pub data_exchange_start_ms: u32,
}

impl Default for ScanTimings {
    fn default() -> Self {
        Self {
            presence_pulse_us: 10_000,
            presence_settle_us: 30_000,
            config_enable_dwell_us: 10_000,
            handshake_settle_ms: 5,
            data_exchange_start_ms: 100,
        }
    }
}

/// Configuration of a `BridgeController`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// First address handed out on the right side. The left side counts down from `right_base - 1`.
    pub right_base: Address,
    /// Failed handshakes allowed for one address before the side is abandoned.
    pub retry_limit: u8,
    /// Device Table capacity, core row included.
    pub max_devices: usize,
    /// Size of the process image in bytes.
    pub image_size: usize,
    pub timings: ScanTimings,
    pub core_serial_number: u32,
    pub core_hw_revision: u16,
    pub core_sw_major: u16,
    pub core_sw_minor: u16,
    /// Start discovery as soon as the controller is created.
    pub auto_start: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            right_base: Address(C_ADR_RIGHT_BASE_DEF),
            retry_limit: C_SCAN_RETRY_LIMIT_DEF,
            max_devices: C_DEV_MAX_DEF,
            image_size: C_IMAGE_SIZE_DEF,
            timings: ScanTimings::default(),
            core_serial_number: 0,
            core_hw_revision: 0,
            core_sw_major: 0,
            core_sw_minor: 0,
            auto_start: true,
        }
    }
}

impl BridgeConfig {
    /// The identity record seeded into row 0 of the Device Table.
    pub fn core_identity(&self) -> Identity {
        Identity {
            serial_number: self.core_serial_number,
            module_type: ModuleType::CORE,
            hw_revision: self.core_hw_revision,
            sw_major: self.core_sw_major,
            sw_minor: self.core_sw_minor,
            svn_revision: 0,
            input_length: CORE_INPUT_LEN,
            output_length: CORE_OUTPUT_LEN,
            feature_flags: 0,
        }
    }

    /// Checks the parameters for consistency.
    pub fn validate(&self) -> Result<(), BackplaneError> {
        let base = self.right_base.0;
        if base <= C_ADR_LEFT_MIN || base >= C_ADR_BROADCAST {
            error!("[Config] Right base address {} leaves no room for one side.", base);
            return Err(BackplaneError::ValidationError(
                "right base address must be between 2 and 254",
            ));
        }
        if self.max_devices == 0 {
            return Err(BackplaneError::ValidationError(
                "device table needs room for the core entry",
            ));
        }
        let core_block = (CORE_INPUT_LEN + CORE_OUTPUT_LEN) as usize;
        if self.image_size < core_block {
            return Err(BackplaneError::ValidationError(
                "process image cannot hold the core status block",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BridgeConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.right_base, Address(32));
        assert_eq!(config.retry_limit, 5);
        assert!(config.auto_start);
    }

    #[test]
    fn test_core_identity_uses_core_block_lengths() {
        let config = BridgeConfig {
            core_serial_number: 4711,
            ..BridgeConfig::default()
        };
        let identity = config.core_identity();
        assert_eq!(identity.module_type, ModuleType::CORE);
        assert_eq!(identity.serial_number, 4711);
        assert_eq!(identity.input_length, CORE_INPUT_LEN);
        assert_eq!(identity.output_length, CORE_OUTPUT_LEN);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BridgeConfig::default();
        config.right_base = Address(1);
        assert!(config.validate().is_err());
        config.right_base = Address(255);
        assert!(config.validate().is_err());

        let config = BridgeConfig {
            image_size: 4,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BackplaneError::ValidationError(_))
        ));
    }
}
