// crates/backplane-rs/src/scan/handshake.rs
use crate::bus::BusSession;
use crate::device::Identity;
use crate::hal::{BackplaneError, BusTransport, Delay};
use crate::telegram::BusCommand;
use crate::types::{Address, Side};
use log::{debug, trace};

/// Brings the module waiting at `address` under management.
///
/// Runs `GetDeviceInfo`, `PiIoConfigure` and `PiIoSetAddress` in order,
/// with a blocking settle delay between them. The first failing exchange
/// aborts the handshake.
///
/// May block for about `2 * settle_ms` plus the transport time of three exchanges.
pub fn configure_module<H>(
    hal: &mut H,
    bus: &mut BusSession,
    address: Address,
    side: Side,
    settle_ms: u32,
) -> Result<Identity, BackplaneError>
where
    H: BusTransport + Delay + ?Sized,
{
    trace!("[Scan] Handshake with candidate {} ({} side).", address, side);

    let info = bus.exchange(hal, address, BusCommand::GetDeviceInfo, &[])?;
    let identity = Identity::deserialize(&info)?;
    hal.delay_ms(settle_ms);

    bus.exchange(hal, address, BusCommand::PiIoConfigure, &[])?;
    hal.delay_ms(settle_ms);

    bus.exchange(
        hal,
        address,
        BusCommand::PiIoSetAddress,
        &[address.0, side as u8],
    )?;

    debug!(
        "[Scan] Module {} (serial {}) configured at {}.",
        identity.module_type, identity.serial_number, address
    );
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::IDENTITY_LEN;
    use crate::telegram::ConfigTelegram;
    use crate::types::ModuleType;
    use alloc::vec::Vec;

    struct OneModule {
        identity: Identity,
        fail_command: Option<BusCommand>,
        commands: Vec<(u16, Vec<u8>)>,
        delays: Vec<u32>,
    }

    impl BusTransport for OneModule {
        fn transfer(
            &mut self,
            request: &ConfigTelegram,
        ) -> Result<Option<ConfigTelegram>, BackplaneError> {
            self.commands.push((request.command, request.data.clone()));
            if self.fail_command.map(|c| c as u16) == Some(request.command) {
                return Err(BackplaneError::BusError);
            }
            let mut data = [0u8; IDENTITY_LEN];
            let payload: &[u8] = if request.command == BusCommand::GetDeviceInfo as u16 {
                self.identity.serialize(&mut data)?;
                &data
            } else {
                &[]
            };
            Ok(Some(ConfigTelegram::response_to(request, true, payload)))
        }
    }

    impl Delay for OneModule {
        fn delay_ms(&mut self, ms: u32) {
            self.delays.push(ms);
        }
    }

    fn module(fail_command: Option<BusCommand>) -> OneModule {
        OneModule {
            identity: Identity {
                serial_number: 99,
                module_type: ModuleType::DIO,
                input_length: 2,
                output_length: 2,
                ..Identity::default()
            },
            fail_command,
            commands: Vec::new(),
            delays: Vec::new(),
        }
    }

    #[test]
    fn test_three_exchanges_in_order() {
        let mut hal = module(None);
        let mut bus = BusSession::new();
        let identity = configure_module(&mut hal, &mut bus, Address(40), Side::Left, 3).unwrap();
        assert_eq!(identity.serial_number, 99);

        let codes: Vec<u16> = hal.commands.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            codes,
            [
                BusCommand::GetDeviceInfo as u16,
                BusCommand::PiIoConfigure as u16,
                BusCommand::PiIoSetAddress as u16
            ]
        );
        assert_eq!(hal.commands[2].1, [40, 1]);
        assert_eq!(hal.delays, [3, 3]);
    }

    #[test]
    fn test_failure_aborts_remaining_exchanges() {
        let mut hal = module(Some(BusCommand::PiIoConfigure));
        let mut bus = BusSession::new();
        assert_eq!(
            configure_module(&mut hal, &mut bus, Address(32), Side::Right, 1),
            Err(BackplaneError::BusError)
        );
        assert_eq!(hal.commands.len(), 2);
    }
}
