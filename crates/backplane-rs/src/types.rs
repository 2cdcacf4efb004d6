use core::convert::TryFrom;
use core::fmt;

// --- Bus Addressing Constants ---

/// Bus address of the core device itself. Always the first Device Table row.
pub const C_ADR_CORE: u8 = 0;

/// Broadcast address understood by every module on the bus (255 or FFh).
pub const C_ADR_BROADCAST: u8 = 0xFF;

/// Default first address handed out on the right side. Left side addresses
/// start one below it and count downwards.
pub const C_ADR_RIGHT_BASE_DEF: u8 = 32;

/// Lowest address that may be handed out on the left side.
pub const C_ADR_LEFT_MIN: u8 = 1;

/// Default number of rows the Device Table accepts (core included).
pub const C_DEV_MAX_DEF: usize = 64;

/// Maximum payload carried by a single configuration telegram.
pub const C_TEL_MAX_DATA: usize = 256;

/// Default size of the shared process image in bytes.
pub const C_IMAGE_SIZE_DEF: usize = 4096;

/// Represents a backplane bus address, wrapping a `u8` for type safety.
///
/// Every `u8` is representable, but 0 is reserved for the core device and
/// 255 for broadcast telegrams. Modules are never allocated either value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u8);

impl Address {
    pub const CORE: Self = Self(C_ADR_CORE);
    pub const BROADCAST: Self = Self(C_ADR_BROADCAST);

    /// Returns true for the broadcast address.
    pub fn is_broadcast(self) -> bool {
        self.0 == C_ADR_BROADCAST
    }

    /// Returns true for the core device address.
    pub fn is_core(self) -> bool {
        self.0 == C_ADR_CORE
    }

    /// Returns the side this address belongs to, given the right base address.
    /// The core and broadcast addresses belong to no side.
    pub fn side(self, right_base: Address) -> Option<Side> {
        if self.is_core() || self.is_broadcast() {
            None
        } else if self.0 >= right_base.0 {
            Some(Side::Right)
        } else {
            Some(Side::Left)
        }
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two directions modules can be chained in relative to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Right = 0,
    Left = 1,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Right => write!(f, "right"),
            Side::Left => write!(f, "left"),
        }
    }
}

/// Module-type code reported in the identity record of every module.
///
/// Codes below 0x8000 identify real hardware. Bit 15 tags a row that was only
/// declared in the configuration but never found on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleType(pub u16);

impl ModuleType {
    /// Tag OR'ed into the type of declared-but-not-present rows.
    pub const NOT_CONNECTED: u16 = 0x8000;

    // --- Gateways ---
    pub const GATE_CANOPEN: Self = Self(71);
    pub const GATE_CCLINK: Self = Self(72);
    pub const GATE_DEVICENET: Self = Self(73);
    pub const GATE_ETHERCAT: Self = Self(74);
    pub const GATE_ETHERNET_IP: Self = Self(75);
    pub const GATE_POWERLINK: Self = Self(76);
    pub const GATE_PROFIBUS: Self = Self(77);
    pub const GATE_PROFINET_RT: Self = Self(78);
    pub const GATE_PROFINET_IRT: Self = Self(79);
    pub const GATE_CANOPEN_MASTER: Self = Self(80);
    pub const GATE_SERCOS3: Self = Self(81);
    pub const GATE_SERIAL: Self = Self(82);
    pub const GATE_PROFINET_SITARA: Self = Self(83);
    pub const GATE_PROFINET_IRT_MASTER: Self = Self(84);
    pub const GATE_ETHERCAT_MASTER: Self = Self(85);
    pub const GATE_MODBUS_RTU: Self = Self(92);
    pub const GATE_MODBUS_TCP: Self = Self(93);

    // --- Core and I/O modules ---
    pub const CORE: Self = Self(95);
    pub const DIO: Self = Self(96);
    pub const DI: Self = Self(97);
    pub const DO: Self = Self(98);
    pub const AIO: Self = Self(103);
    pub const MIO: Self = Self(118);

    /// The type code with the not-connected tag stripped.
    pub fn base(self) -> Self {
        Self(self.0 & !Self::NOT_CONNECTED)
    }

    /// Returns the same type tagged as declared-but-not-present.
    pub fn not_connected(self) -> Self {
        Self(self.0 | Self::NOT_CONNECTED)
    }

    /// Returns true if this row was declared but never found on the bus.
    pub fn is_not_connected(self) -> bool {
        (self.0 & Self::NOT_CONNECTED) != 0
    }

    /// Returns true for gateway-class modules. These are served by their own
    /// protocol layer and are never polled by the cyclic dispatcher.
    pub fn is_gateway(self) -> bool {
        matches!(
            self.base(),
            Self::GATE_CANOPEN
                | Self::GATE_CCLINK
                | Self::GATE_DEVICENET
                | Self::GATE_ETHERCAT
                | Self::GATE_ETHERNET_IP
                | Self::GATE_POWERLINK
                | Self::GATE_PROFIBUS
                | Self::GATE_PROFINET_RT
                | Self::GATE_PROFINET_IRT
                | Self::GATE_CANOPEN_MASTER
                | Self::GATE_SERCOS3
                | Self::GATE_SERIAL
                | Self::GATE_PROFINET_SITARA
                | Self::GATE_PROFINET_IRT_MASTER
                | Self::GATE_ETHERCAT_MASTER
                | Self::GATE_MODBUS_RTU
                | Self::GATE_MODBUS_TCP
        )
    }

    /// Returns true for the built-in I/O module types that have a cyclic driver.
    pub fn is_io(self) -> bool {
        matches!(
            self.base(),
            Self::DIO | Self::DI | Self::DO | Self::AIO | Self::MIO
        )
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_not_connected() {
            write!(f, "{} (not connected)", self.base().0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Error type for an out-of-range allocation request.
#[derive(Debug, PartialEq, Eq)]
pub enum AddressError {
    /// The address is reserved (core or broadcast) and cannot be given to a module.
    Reserved(u8),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Reserved(value) => write!(
                f,
                "Address {} is reserved. Module addresses are 1-254.",
                value
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AddressError {}

impl TryFrom<u8> for Address {
    type Error = AddressError;

    /// Creates a module `Address`, rejecting the reserved core and broadcast values.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            C_ADR_CORE | C_ADR_BROADCAST => Err(AddressError::Reserved(value)),
            _ => Ok(Address(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_side_split() {
        let base = Address(C_ADR_RIGHT_BASE_DEF);
        assert_eq!(Address(32).side(base), Some(Side::Right));
        assert_eq!(Address(40).side(base), Some(Side::Right));
        assert_eq!(Address(31).side(base), Some(Side::Left));
        assert_eq!(Address::CORE.side(base), None);
        assert_eq!(Address::BROADCAST.side(base), None);
    }

    #[test]
    fn test_module_address_rejects_reserved() {
        assert!(Address::try_from(0).is_err());
        assert!(Address::try_from(255).is_err());
        assert_eq!(Address::try_from(33), Ok(Address(33)));
    }

    #[test]
    fn test_module_type_tags() {
        let declared = ModuleType::DIO.not_connected();
        assert!(declared.is_not_connected());
        assert_eq!(declared.base(), ModuleType::DIO);
        assert!(declared.is_io());
        assert!(!declared.is_gateway());
        assert!(ModuleType::GATE_PROFINET_RT.is_gateway());
        assert!(!ModuleType::CORE.is_io());
    }
}
