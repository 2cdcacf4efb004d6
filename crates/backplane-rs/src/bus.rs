// crates/backplane-rs/src/bus.rs
//! Request/response bookkeeping on top of a `BusTransport`.

use crate::hal::{BackplaneError, BusTransport};
use crate::telegram::{BusCommand, COMMAND_MASK, ConfigTelegram};
use crate::types::Address;
use alloc::vec::Vec;
use log::{trace, warn};

/// Tracks the rolling sequence number of configuration telegrams sent by the core.
#[derive(Debug, Default)]
pub struct BusSession {
    sequence: u16,
}

impl BusSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sequence number the next request will carry.
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    fn take_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Runs one request/response exchange and returns the response payload.
    ///
    /// Fails if the transport fails, the answer does not belong to this
    /// request, or the module flagged an error.
    pub fn exchange<T: BusTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        address: Address,
        command: BusCommand,
        payload: &[u8],
    ) -> Result<Vec<u8>, BackplaneError> {
        let request = ConfigTelegram::request(
            address,
            Address::CORE,
            command,
            self.take_sequence(),
            payload,
        )?;
        trace!(
            "[Bus] -> {:?} to {} (seq {}, {} bytes)",
            command,
            address,
            request.sequence,
            payload.len()
        );

        let response = transport
            .transfer(&request)?
            .ok_or(BackplaneError::BusError)?;

        if response.source != address
            || response.sequence != request.sequence
            || (response.command & COMMAND_MASK) != command as u16
        {
            warn!(
                "[Bus] Mismatched answer to {:?} from {}: src {}, seq {}, cmd {:#06x}",
                command, address, response.source, response.sequence, response.command
            );
            return Err(BackplaneError::UnexpectedResponse(response.command));
        }
        if !response.is_ok() {
            return Err(BackplaneError::ModuleRejected(response.command));
        }
        Ok(response.data)
    }

    /// Sends a request to every module. Broadcasts have no answer.
    pub fn broadcast<T: BusTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        command: BusCommand,
        payload: &[u8],
    ) -> Result<(), BackplaneError> {
        let request = ConfigTelegram::request(
            Address::BROADCAST,
            Address::CORE,
            command,
            self.take_sequence(),
            payload,
        )?;
        trace!("[Bus] -> {:?} broadcast (seq {})", command, request.sequence);
        transport.transfer(&request).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// Answers every request with a scripted outcome.
    struct ScriptedTransport {
        answer_ok: bool,
        wrong_sequence: bool,
        sent: Vec<ConfigTelegram>,
    }

    impl BusTransport for ScriptedTransport {
        fn transfer(
            &mut self,
            request: &ConfigTelegram,
        ) -> Result<Option<ConfigTelegram>, BackplaneError> {
            self.sent.push(request.clone());
            if request.destination.is_broadcast() {
                return Ok(None);
            }
            let mut response = ConfigTelegram::response_to(request, self.answer_ok, &[1, 2]);
            if self.wrong_sequence {
                response.sequence = response.sequence.wrapping_add(1);
            }
            Ok(Some(response))
        }
    }

    fn transport(answer_ok: bool, wrong_sequence: bool) -> ScriptedTransport {
        ScriptedTransport {
            answer_ok,
            wrong_sequence,
            sent: Vec::new(),
        }
    }

    #[test]
    fn test_exchange_returns_payload_and_advances_sequence() {
        let mut session = BusSession::new();
        let mut bus = transport(true, false);
        let data = session
            .exchange(&mut bus, Address(32), BusCommand::GetDeviceInfo, &[])
            .unwrap();
        assert_eq!(data, vec![1, 2]);
        session
            .exchange(&mut bus, Address(32), BusCommand::PiIoConfigure, &[])
            .unwrap();
        assert_eq!(bus.sent[0].sequence, 0);
        assert_eq!(bus.sent[1].sequence, 1);
        assert_eq!(session.next_sequence(), 2);
    }

    #[test]
    fn test_exchange_rejects_error_and_mismatch() {
        let mut session = BusSession::new();
        let mut rejecting = transport(false, false);
        assert!(matches!(
            session.exchange(&mut rejecting, Address(32), BusCommand::GetDeviceInfo, &[]),
            Err(BackplaneError::ModuleRejected(_))
        ));

        let mut confused = transport(true, true);
        assert!(matches!(
            session.exchange(&mut confused, Address(32), BusCommand::GetDeviceInfo, &[]),
            Err(BackplaneError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_broadcast_has_no_answer() {
        let mut session = BusSession::new();
        let mut bus = transport(true, false);
        assert_eq!(
            session.broadcast(&mut bus, BusCommand::PiIoStartDataExchange, &[]),
            Ok(())
        );
        assert!(bus.sent[0].destination.is_broadcast());
    }
}
