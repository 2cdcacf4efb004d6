// crates/backplane-rs/tests/simulator/module.rs
use backplane_rs::telegram::{BusCommand, ConfigTelegram};
use backplane_rs::{Address, Identity, ModuleType};

/// One pluggable module on the simulated backplane.
#[derive(Debug, Clone)]
pub struct SimulatedModule {
    pub identity: Identity,
    /// Bus address assigned by `PiIoSetAddress`, `None` until configured.
    pub address: Option<Address>,
    /// Number of upcoming telegrams this module will not answer.
    pub silent_for: u32,
    /// Set once the start-of-data-exchange broadcast was received.
    pub exchanging: bool,
    /// Maintenance commands received after configuration.
    pub maintenance: Vec<u16>,
}

impl SimulatedModule {
    pub fn new(module_type: ModuleType, serial_number: u32, input: u16, output: u16) -> Self {
        Self {
            identity: Identity {
                serial_number,
                module_type,
                hw_revision: 2,
                sw_major: 1,
                sw_minor: 4,
                input_length: input,
                output_length: output,
                ..Identity::default()
            },
            address: None,
            silent_for: 0,
            exchanging: false,
            maintenance: Vec::new(),
        }
    }

    /// A digital I/O module.
    pub fn dio(serial_number: u32, input: u16, output: u16) -> Self {
        Self::new(ModuleType::DIO, serial_number, input, output)
    }

    pub fn gateway(module_type: ModuleType, serial_number: u32) -> Self {
        Self::new(module_type, serial_number, 0, 0)
    }

    /// Makes the module ignore the next `count` telegrams addressed to it.
    pub fn silent_for(mut self, count: u32) -> Self {
        self.silent_for = count;
        self
    }

    /// Builds this module's answer to `request`, or `None` for a timeout.
    pub fn answer(&mut self, request: &ConfigTelegram) -> Option<ConfigTelegram> {
        if self.silent_for > 0 {
            self.silent_for -= 1;
            return None;
        }
        let command = BusCommand::try_from(request.command).ok()?;
        let payload = match command {
            BusCommand::GetDeviceInfo => {
                let mut buffer = [0u8; backplane_rs::device::IDENTITY_LEN];
                self.identity.serialize(&mut buffer).ok()?;
                buffer.to_vec()
            }
            BusCommand::PiIoConfigure => Vec::new(),
            BusCommand::PiIoSetAddress => {
                self.address = request.data.first().map(|a| Address(*a));
                Vec::new()
            }
            BusCommand::PiIoStartDataExchange => {
                self.exchanging = true;
                Vec::new()
            }
            BusCommand::SetFirmwareUpdateMode
            | BusCommand::WriteSerialNumber
            | BusCommand::ForceReset => {
                self.maintenance.push(request.command);
                Vec::new()
            }
        };
        Some(ConfigTelegram::response_to(request, true, &payload))
    }
}
