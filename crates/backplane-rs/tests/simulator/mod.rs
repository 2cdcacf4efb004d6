// crates/backplane-rs/tests/simulator/mod.rs
pub mod module;

pub use module::SimulatedModule;

use backplane_rs::telegram::ConfigTelegram;
use backplane_rs::{
    Address, BackplaneError, BridgeConfig, BridgeControl, BridgeController, BridgeState, BusTransport,
    ConfigLoader, DeclaredEntry, Delay, DeviceEntry, DeviceIndex, DriverRegistry, Indicator,
    Indicators, LineDirection, ModuleType, ProcessImage, Side, SignalProbe,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Installs `env_logger` once for the whole test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A virtual backplane implementing every collaborator the controller needs.
///
/// Modules are chained to the right and to the left of the core. The module
/// answering an unaddressed telegram is the first unconfigured module on the
/// side whose config-enable line is currently driven high.
#[derive(Debug, Default)]
pub struct SimulatedBackplane {
    pub right: Vec<SimulatedModule>,
    pub left: Vec<SimulatedModule>,
    /// Current level and direction of the (right, left) config-enable lines.
    config_lines: [(bool, Option<LineDirection>); 2],
    pub declared: Vec<DeclaredEntry>,
    pub fail_config_load: bool,
    /// Every telegram the core sent, in order.
    pub bus_log: Vec<ConfigTelegram>,
    pub delays: Vec<u32>,
    pub indicator_log: Vec<(Indicator, bool)>,
    pub started_drivers: Vec<(ModuleType, DeviceIndex)>,
    /// Addresses whose cyclic exchange fails.
    pub failing_exchanges: HashSet<u8>,
    pub cyclic_exchanges: usize,
    /// When set, each cyclic exchange records whether the bridge lock is held.
    pub control: Option<Arc<BridgeControl>>,
    pub lock_held_in_exchange: Vec<bool>,
}

impl SimulatedBackplane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_right(mut self, module: SimulatedModule) -> Self {
        self.right.push(module);
        self
    }

    pub fn with_left(mut self, module: SimulatedModule) -> Self {
        self.left.push(module);
        self
    }

    pub fn with_declared(mut self, declared: Vec<DeclaredEntry>) -> Self {
        self.declared = declared;
        self
    }

    /// The last level written to `indicator`.
    pub fn indicator(&self, indicator: Indicator) -> Option<bool> {
        self.indicator_log
            .iter()
            .rev()
            .find(|(i, _)| *i == indicator)
            .map(|(_, level)| *level)
    }

    /// Unicast telegrams sent with `command`.
    pub fn sent(&self, command: backplane_rs::telegram::BusCommand) -> Vec<&ConfigTelegram> {
        self.bus_log
            .iter()
            .filter(|t| t.command == command as u16)
            .collect()
    }

    pub fn unicast_count(&self) -> usize {
        self.bus_log
            .iter()
            .filter(|t| !t.destination.is_broadcast())
            .count()
    }

    fn line_index(side: Side) -> usize {
        match side {
            Side::Right => 0,
            Side::Left => 1,
        }
    }

    fn enabled(&self, side: Side) -> bool {
        matches!(
            self.config_lines[Self::line_index(side)],
            (true, Some(LineDirection::Output))
        )
    }

    fn chain_mut(&mut self, side: Side) -> &mut Vec<SimulatedModule> {
        match side {
            Side::Right => &mut self.right,
            Side::Left => &mut self.left,
        }
    }

    fn responder(&mut self, destination: Address) -> Option<&mut SimulatedModule> {
        let addressed = self
            .right
            .iter()
            .chain(self.left.iter())
            .any(|m| m.address == Some(destination));
        if addressed {
            return self
                .right
                .iter_mut()
                .chain(self.left.iter_mut())
                .find(|m| m.address == Some(destination));
        }
        let side = [Side::Right, Side::Left]
            .into_iter()
            .find(|side| self.enabled(*side))?;
        self.chain_mut(side).iter_mut().find(|m| m.address.is_none())
    }
}

impl SignalProbe for SimulatedBackplane {
    fn read_sense_line(&mut self, side: Side) -> bool {
        self.chain_mut(side).iter().any(|m| m.address.is_none())
    }

    fn write_config_line(&mut self, side: Side, level: bool, direction: LineDirection) {
        self.config_lines[Self::line_index(side)] = (level, Some(direction));
    }
}

impl BusTransport for SimulatedBackplane {
    fn transfer(
        &mut self,
        request: &ConfigTelegram,
    ) -> Result<Option<ConfigTelegram>, BackplaneError> {
        self.bus_log.push(request.clone());
        if request.destination.is_broadcast() {
            for module in self.right.iter_mut().chain(self.left.iter_mut()) {
                if module.address.is_some() {
                    module.answer(request);
                }
            }
            return Ok(None);
        }
        let answer = self
            .responder(request.destination)
            .and_then(|module| module.answer(request));
        answer.map(Some).ok_or(BackplaneError::BusError)
    }
}

impl ConfigLoader for SimulatedBackplane {
    fn load_declared_configuration(&mut self) -> Result<Vec<DeclaredEntry>, BackplaneError> {
        if self.fail_config_load {
            return Err(BackplaneError::ConfigLoad("simulated load failure"));
        }
        Ok(self.declared.clone())
    }
}

impl DriverRegistry for SimulatedBackplane {
    fn start_driver(&mut self, module_type: ModuleType, index: DeviceIndex) -> bool {
        self.started_drivers.push((module_type, index));
        true
    }

    fn cyclic_exchange(
        &mut self,
        _index: DeviceIndex,
        device: &DeviceEntry,
        image: &mut ProcessImage,
    ) -> Result<(), BackplaneError> {
        self.cyclic_exchanges += 1;
        if let Some(control) = &self.control {
            self.lock_held_in_exchange.push(control.is_locked());
        }
        if self.failing_exchanges.contains(&device.address.0) {
            return Err(BackplaneError::DriverError);
        }
        if device.identity.input_length > 0 {
            image.write_u8(device.input_offset as usize, device.address.0)?;
        }
        Ok(())
    }
}

impl Indicators for SimulatedBackplane {
    fn set_indicator(&mut self, indicator: Indicator, level: bool) {
        self.indicator_log.push((indicator, level));
    }
}

impl Delay for SimulatedBackplane {
    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

/// Drives a controller with a fixed cycle period.
pub struct Harness {
    pub controller: BridgeController<SimulatedBackplane>,
    pub now_us: u64,
    pub period_us: u64,
}

impl Harness {
    pub fn new(backplane: SimulatedBackplane, config: BridgeConfig) -> Self {
        init_logging();
        Self {
            controller: BridgeController::new(backplane, config).unwrap(),
            now_us: 0,
            period_us: 1_000,
        }
    }

    pub fn cycle(&mut self) -> BridgeState {
        let state = self.controller.run_cycle(self.now_us);
        self.now_us += self.period_us;
        state
    }

    /// Runs cycles until the bridge reaches `state`. Returns the number of cycles used.
    pub fn run_until(&mut self, state: BridgeState, max_cycles: usize) -> Option<usize> {
        for n in 1..=max_cycles {
            if self.cycle() == state {
                return Some(n);
            }
        }
        None
    }

    pub fn backplane(&self) -> &SimulatedBackplane {
        self.controller.hal()
    }

    /// Addresses of the Device Table rows, in table order.
    pub fn addresses(&self) -> Vec<u8> {
        self.controller
            .table()
            .iter()
            .map(|(_, e)| e.address.0)
            .collect()
    }
}
