// crates/backplane-rs/src/dispatch.rs
//! Per-cycle I/O exchange with every active module and communication-health accounting.

use crate::device::{DeviceIndex, DeviceTable};
use crate::hal::DriverRegistry;
use crate::process_image::{CoreImage, ProcessImage, StatusFlags};
use crate::types::{Address, Side};
use log::{debug, error, trace, warn};

/// Result of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Devices polled this cycle.
    pub polled: usize,
    /// At least one exchange failed.
    pub had_error: bool,
    /// Sum of all device error counters, saturated.
    pub aggregate_errors: u16,
    /// The aggregate count is above the lower threshold.
    pub degraded: bool,
    /// The aggregate count is above the upper threshold; the bridge must stop.
    pub stop_requested: bool,
}

/// Runs the cyclic exchange once the topology is configured.
#[derive(Debug)]
pub struct Dispatcher {
    right_base: Address,
    right_gateway: Option<Address>,
    left_gateway: Option<Address>,
    last_cycle_us: Option<u64>,
}

impl Dispatcher {
    pub fn new(right_base: Address) -> Self {
        Self {
            right_base,
            right_gateway: None,
            left_gateway: None,
            last_cycle_us: None,
        }
    }

    /// Forgets the gateway bookkeeping and the cycle clock.
    pub fn reset(&mut self) {
        self.right_gateway = None;
        self.left_gateway = None;
        self.last_cycle_us = None;
    }

    /// The first gateway module found on `side`.
    pub fn gateway(&self, side: Side) -> Option<Address> {
        match side {
            Side::Right => self.right_gateway,
            Side::Left => self.left_gateway,
        }
    }

    /// Polls every active non-core row once and updates the core status block.
    pub fn run_cycle<H: DriverRegistry + ?Sized>(
        &mut self,
        hal: &mut H,
        table: &mut DeviceTable,
        image: &mut ProcessImage,
        core: &CoreImage,
        status: &mut StatusFlags,
        current_time_us: u64,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for i in 1..table.len() {
            let index = DeviceIndex(i);
            let Some(entry) = table.get(index).copied() else {
                continue;
            };
            if !entry.active {
                continue;
            }

            if entry.identity.module_type.is_gateway() {
                self.note_gateway(entry.address, status);
                continue;
            }

            let result = hal.cyclic_exchange(index, &entry, image);
            outcome.polled += 1;
            if let Some(row) = table.get_mut(index) {
                match result {
                    Ok(()) => row.clear_errors(),
                    Err(e) => {
                        row.record_error();
                        outcome.had_error = true;
                        trace!(
                            "[Dispatch] Exchange with {} failed: {} (count {}).",
                            entry.address,
                            e,
                            row.error_count
                        );
                    }
                }
            }
        }

        let total = table.aggregate_errors();
        outcome.aggregate_errors = u16::try_from(total).unwrap_or(u16::MAX);

        let cycle_ms = self
            .last_cycle_us
            .map(|last| current_time_us.saturating_sub(last) / 1_000)
            .unwrap_or(0);
        self.last_cycle_us = Some(current_time_us);

        if let Err(e) = core.write_error_count(image, outcome.aggregate_errors) {
            warn!("[Dispatch] Could not publish error count: {}", e);
        }
        if let Err(e) = core.write_io_cycle(image, u8::try_from(cycle_ms).unwrap_or(u8::MAX)) {
            warn!("[Dispatch] Could not publish cycle time: {}", e);
        }

        let (lower, upper) = match core.read_error_limits(image) {
            Ok(limits) => limits,
            Err(e) => {
                error!("[Dispatch] Error limits unreadable, limits disabled: {}", e);
                (0, 0)
            }
        };
        if lower != 0 && outcome.aggregate_errors > lower {
            outcome.degraded = true;
            warn!(
                "[Dispatch] Bus errors {} above lower limit {}.",
                outcome.aggregate_errors, lower
            );
        }
        if upper != 0 && outcome.aggregate_errors > upper {
            outcome.stop_requested = true;
            error!(
                "[Dispatch] Bus errors {} above upper limit {}, requesting stop.",
                outcome.aggregate_errors, upper
            );
        }

        outcome
    }

    fn note_gateway(&mut self, address: Address, status: &mut StatusFlags) {
        match address.side(self.right_base) {
            Some(Side::Right) => {
                if self.right_gateway.is_none() {
                    debug!("[Dispatch] Right gateway at {}.", address);
                    self.right_gateway = Some(address);
                }
                status.insert(StatusFlags::RIGHT_GATEWAY);
            }
            Some(Side::Left) => {
                if self.left_gateway.is_none() {
                    debug!("[Dispatch] Left gateway at {}.", address);
                    self.left_gateway = Some(address);
                }
                status.insert(StatusFlags::LEFT_GATEWAY);
            }
            None => {}
        }
    }
}
