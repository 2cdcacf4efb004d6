// crates/backplane-rs/src/scan/scanner.rs
use super::handshake::configure_module;
use super::states::ScanState;
use super::timer::CountdownTimer;
use crate::bus::BusSession;
use crate::config::{BridgeConfig, ScanTimings};
use crate::device::DeviceTable;
use crate::hal::{BusTransport, Delay, LineDirection, SignalProbe};
use crate::types::{Address, C_ADR_BROADCAST, C_ADR_LEFT_MIN, Side};
use log::{debug, error, info, warn};

/// What the owner of the scanner has to do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Discovery is still running.
    Scanning,
    /// The scanner rests in `EndOfConfig`.
    ///
    /// `entered` is true on the single step that ran the entry actions of
    /// `EndOfConfig`; the owner runs the end-of-configuration phase then.
    Complete { entered: bool },
}

/// The topology scan state machine.
///
/// Every step first runs the entry actions of a freshly entered state, then
/// its exit check. A transition defers the entry actions of the target state
/// to the next step.
#[derive(Debug)]
pub struct Scanner {
    state: ScanState,
    entry_pending: bool,
    retries: u8,
    retry_limit: u8,
    right_base: Address,
    next_right: Option<Address>,
    next_left: Option<Address>,
    timings: ScanTimings,
    timer: CountdownTimer,
}

impl Scanner {
    pub fn new(config: &BridgeConfig) -> Self {
        let mut scanner = Self {
            state: ScanState::Init,
            entry_pending: true,
            retries: 0,
            retry_limit: config.retry_limit,
            right_base: config.right_base,
            next_right: None,
            next_left: None,
            timings: config.timings,
            timer: CountdownTimer::new(),
        };
        scanner.reset();
        scanner
    }

    /// Returns to `Init` and rewinds both address allocators.
    pub fn reset(&mut self) {
        self.state = ScanState::Init;
        self.entry_pending = true;
        self.retries = 0;
        self.timer.cancel();
        self.next_right = Some(self.right_base);
        self.next_left = self
            .right_base
            .0
            .checked_sub(1)
            .filter(|a| *a >= C_ADR_LEFT_MIN)
            .map(Address);
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Failed handshakes at the current address.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// The address the next handshake on `side` would use, `None` once the side is exhausted.
    pub fn next_address(&self, side: Side) -> Option<Address> {
        match side {
            Side::Right => self.next_right,
            Side::Left => self.next_left,
        }
    }

    /// Advances the scan by one cycle.
    ///
    /// May block while a handshake is running in one of the dialogue states.
    pub fn step<H>(
        &mut self,
        hal: &mut H,
        bus: &mut BusSession,
        table: &mut DeviceTable,
        now_us: u64,
    ) -> ScanOutcome
    where
        H: SignalProbe + BusTransport + Delay + ?Sized,
    {
        let entered = self.entry_pending;
        if entered {
            self.entry_pending = false;
            self.on_entry(hal, now_us);
        }

        if let Some(next) = self.check(hal, bus, table, now_us) {
            debug!("[Scan] {} -> {}", self.state, next);
            self.state = next;
            self.entry_pending = true;
        }

        if self.state.is_complete() && !self.entry_pending {
            ScanOutcome::Complete { entered }
        } else {
            ScanOutcome::Scanning
        }
    }

    fn on_entry<H: SignalProbe + ?Sized>(&mut self, hal: &mut H, now_us: u64) {
        match self.state {
            ScanState::Init => {
                hal.write_config_line(Side::Right, false, LineDirection::Input);
                hal.write_config_line(Side::Left, false, LineDirection::Input);
            }
            ScanState::PresentSignalling1 => {
                hal.write_config_line(Side::Right, true, LineDirection::Output);
                hal.write_config_line(Side::Left, true, LineDirection::Output);
                self.timer.start(now_us, self.timings.presence_pulse_us);
            }
            ScanState::PresentSignalling2 => {
                hal.write_config_line(Side::Right, false, LineDirection::Input);
                hal.write_config_line(Side::Left, false, LineDirection::Input);
                self.timer.start(now_us, self.timings.presence_settle_us);
            }
            ScanState::ConfigRightStart => {
                hal.write_config_line(Side::Right, true, LineDirection::Output);
                self.timer.start(now_us, self.timings.config_enable_dwell_us);
            }
            ScanState::ConfigLeftStart => {
                hal.write_config_line(Side::Left, true, LineDirection::Output);
                self.timer.start(now_us, self.timings.config_enable_dwell_us);
            }
            ScanState::ConfigDialogueRight | ScanState::ConfigDialogueLeft => {
                self.retries = 0;
            }
            ScanState::InitialSlaveDetectionLeft => {
                hal.write_config_line(Side::Right, false, LineDirection::Input);
            }
            ScanState::EndOfConfig => {
                hal.write_config_line(Side::Left, false, LineDirection::Input);
                info!("[Scan] Topology scan complete.");
            }
            ScanState::InitialSlaveDetectionRight
            | ScanState::SlaveDetectionRight
            | ScanState::SlaveDetectionLeft => {}
        }
    }

    fn check<H>(
        &mut self,
        hal: &mut H,
        bus: &mut BusSession,
        table: &mut DeviceTable,
        now_us: u64,
    ) -> Option<ScanState>
    where
        H: SignalProbe + BusTransport + Delay + ?Sized,
    {
        match self.state {
            ScanState::Init => Some(ScanState::PresentSignalling1),
            ScanState::PresentSignalling1 => self
                .timer
                .is_expired(now_us)
                .then_some(ScanState::PresentSignalling2),
            ScanState::PresentSignalling2 => self
                .timer
                .is_expired(now_us)
                .then_some(ScanState::InitialSlaveDetectionRight),
            ScanState::InitialSlaveDetectionRight => Some(if hal.read_sense_line(Side::Right) {
                ScanState::ConfigRightStart
            } else {
                info!("[Scan] No module on the right side.");
                ScanState::InitialSlaveDetectionLeft
            }),
            ScanState::ConfigRightStart => self
                .timer
                .is_expired(now_us)
                .then_some(ScanState::ConfigDialogueRight),
            ScanState::ConfigDialogueRight => self.dialogue(hal, bus, table, Side::Right),
            ScanState::SlaveDetectionRight => Some(if hal.read_sense_line(Side::Right) {
                ScanState::ConfigDialogueRight
            } else {
                ScanState::InitialSlaveDetectionLeft
            }),
            ScanState::InitialSlaveDetectionLeft => Some(if hal.read_sense_line(Side::Left) {
                ScanState::ConfigLeftStart
            } else {
                info!("[Scan] No module on the left side.");
                ScanState::EndOfConfig
            }),
            ScanState::ConfigLeftStart => self
                .timer
                .is_expired(now_us)
                .then_some(ScanState::ConfigDialogueLeft),
            ScanState::ConfigDialogueLeft => self.dialogue(hal, bus, table, Side::Left),
            ScanState::SlaveDetectionLeft => Some(if hal.read_sense_line(Side::Left) {
                ScanState::ConfigDialogueLeft
            } else {
                ScanState::EndOfConfig
            }),
            ScanState::EndOfConfig => None,
        }
    }

    /// One handshake attempt against the next address of `side`.
    fn dialogue<H>(
        &mut self,
        hal: &mut H,
        bus: &mut BusSession,
        table: &mut DeviceTable,
        side: Side,
    ) -> Option<ScanState>
    where
        H: BusTransport + Delay + ?Sized,
    {
        let (detected, side_done) = match side {
            Side::Right => (
                ScanState::SlaveDetectionRight,
                ScanState::InitialSlaveDetectionLeft,
            ),
            Side::Left => (ScanState::SlaveDetectionLeft, ScanState::EndOfConfig),
        };

        let Some(address) = self.next_address(side) else {
            warn!("[Scan] Address range of the {} side exhausted.", side);
            return Some(side_done);
        };
        if table.len() >= table.capacity() {
            error!(
                "[Scan] Device table full ({} rows), ending the {} side.",
                table.capacity(),
                side
            );
            return Some(side_done);
        }

        match configure_module(hal, bus, address, side, self.timings.handshake_settle_ms) {
            Ok(identity) => match table.append(address, identity) {
                Ok(index) => {
                    info!(
                        "[Scan] Added {} at address {} as row {}.",
                        identity.module_type, address, index
                    );
                    self.advance(side);
                    Some(detected)
                }
                Err(_) => Some(side_done),
            },
            Err(e) => {
                self.retries = self.retries.saturating_add(1);
                warn!(
                    "[Scan] Handshake at {} failed ({}), attempt {}.",
                    address, e, self.retries
                );
                if self.retries > self.retry_limit {
                    warn!(
                        "[Scan] Giving up on the {} side after {} retries.",
                        side, self.retry_limit
                    );
                    Some(side_done)
                } else {
                    None
                }
            }
        }
    }

    fn advance(&mut self, side: Side) {
        match side {
            Side::Right => {
                self.next_right = self
                    .next_right
                    .and_then(|a| a.0.checked_add(1))
                    .filter(|a| *a < C_ADR_BROADCAST)
                    .map(Address);
            }
            Side::Left => {
                self.next_left = self
                    .next_left
                    .and_then(|a| a.0.checked_sub(1))
                    .filter(|a| *a >= C_ADR_LEFT_MIN)
                    .map(Address);
            }
        }
    }
}
