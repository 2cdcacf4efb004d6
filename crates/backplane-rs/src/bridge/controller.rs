// crates/backplane-rs/src/bridge/controller.rs
use super::control::{BridgeControl, SharedState};
use super::state::BridgeState;
use crate::bus::BusSession;
use crate::config::BridgeConfig;
use crate::device::{DeclaredEntry, DeviceTable};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::hal::{BackplaneError, BridgeHal, Indicator};
use crate::process_image::{CoreImage, ProcessImage, StatusFlags};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::scan::{ScanOutcome, ScanState, Scanner};
use crate::telegram::BusCommand;
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, error, info, warn};

/// LED byte bits, in order, and the indicator each one drives.
const LED_BITS: [Indicator; 4] = [
    Indicator::A1Green,
    Indicator::A1Red,
    Indicator::A2Green,
    Indicator::A2Red,
];

/// Owns one backplane: its collaborators, the Device Table, the scanner,
/// the dispatcher and the process image.
///
/// Drive it by calling `run_cycle` periodically from a single context. Use
/// `control()` to stop, reset or queue maintenance from anywhere else.
pub struct BridgeController<H: BridgeHal> {
    hal: H,
    config: BridgeConfig,
    control: Arc<BridgeControl>,
    table: DeviceTable,
    scanner: Scanner,
    dispatcher: Dispatcher,
    bus: BusSession,
    image: ProcessImage,
    /// Set once the reconciler has anchored the core status blocks.
    core: Option<CoreImage>,
    declared: Vec<DeclaredEntry>,
    /// Whether the running-side effects (flag, fault indicator) are applied.
    running_applied: bool,
    last_led: Option<u8>,
    last_report: Option<ReconcileReport>,
    last_dispatch: Option<DispatchOutcome>,
}

impl<H: BridgeHal> BridgeController<H> {
    /// Creates a controller and loads the declared configuration.
    ///
    /// Starts in `Initializing` when `config.auto_start` is set, otherwise in `Stopped`.
    pub fn new(mut hal: H, config: BridgeConfig) -> Result<Self, BackplaneError> {
        config.validate()?;
        let declared = hal.load_declared_configuration()?;
        let initial = if config.auto_start {
            BridgeState::Initializing
        } else {
            BridgeState::Stopped
        };
        info!(
            "[Bridge] Created with {} declared modules, starting {}.",
            declared.len(),
            initial
        );
        hal.set_indicator(Indicator::Fault, true);

        Ok(Self {
            table: DeviceTable::new(config.max_devices, config.core_identity()),
            scanner: Scanner::new(&config),
            dispatcher: Dispatcher::new(config.right_base),
            bus: BusSession::new(),
            image: ProcessImage::new(config.image_size),
            core: None,
            control: Arc::new(BridgeControl::new(initial)),
            declared,
            running_applied: false,
            last_led: None,
            last_report: None,
            last_dispatch: None,
            hal,
            config,
        })
    }

    /// Runs one control cycle and returns the bridge state afterwards.
    ///
    /// Holds the bridge lock for the whole invocation. May block for hundreds
    /// of milliseconds while modules are configured and while the cyclic
    /// exchange is started.
    pub fn run_cycle(&mut self, current_time_us: u64) -> BridgeState {
        let control = Arc::clone(&self.control);
        let mut shared = control.lock();

        if shared.reset_requested {
            shared.reset_requested = false;
            if let Err(e) = self.reinitialize(&mut shared) {
                error!("[Bridge] Reset failed: {}", e);
            }
        }

        match shared.state {
            BridgeState::Stopped => self.run_maintenance(&mut shared),
            BridgeState::Initializing | BridgeState::Running => {
                self.run_topology(&mut shared, current_time_us)
            }
        }

        self.apply_running(&mut shared);
        self.publish(&shared);
        shared.state
    }

    /// Forces `Stopped`, reloads the declared configuration and re-seeds the
    /// Device Table, leaving the bridge ready to scan again.
    pub fn reset(&mut self) -> Result<(), BackplaneError> {
        let control = Arc::clone(&self.control);
        let mut shared = control.lock();
        let result = self.reinitialize(&mut shared);
        self.apply_running(&mut shared);
        result
    }

    fn reinitialize(&mut self, shared: &mut SharedState) -> Result<(), BackplaneError> {
        info!("[Bridge] Re-initializing.");
        shared.state = BridgeState::Stopped;
        self.apply_running(shared);

        self.table.reset(self.config.core_identity());
        self.scanner.reset();
        self.dispatcher.reset();
        self.image.clear();
        self.core = None;
        self.last_led = None;
        self.last_report = None;
        self.last_dispatch = None;
        shared.status = StatusFlags::empty();
        shared.aggregate_errors = 0;

        self.declared = self.hal.load_declared_configuration()?;
        shared.state = BridgeState::Initializing;
        Ok(())
    }

    fn run_topology(&mut self, shared: &mut SharedState, current_time_us: u64) {
        let outcome = self.scanner.step(
            &mut self.hal,
            &mut self.bus,
            &mut self.table,
            current_time_us,
        );
        if let ScanOutcome::Complete { entered } = outcome {
            if entered {
                self.end_of_config(shared);
            }
            if shared.state == BridgeState::Running {
                self.dispatch(shared, current_time_us);
            }
        }
    }

    /// Reconciles, starts the cyclic exchange and the drivers, then enters `Running`.
    ///
    /// Blocks for the data-exchange start delay.
    fn end_of_config(&mut self, shared: &mut SharedState) {
        let report = reconcile(
            &mut self.table,
            &self.declared,
            self.image.len(),
            &mut shared.status,
        );
        self.core = Some(report.core);
        self.last_report = Some(report);

        if let Err(e) = self
            .bus
            .broadcast(&mut self.hal, BusCommand::PiIoStartDataExchange, &[])
        {
            warn!("[Bridge] Start of data exchange broadcast failed: {}", e);
        }
        self.hal.delay_ms(self.config.timings.data_exchange_start_ms);

        for (index, entry) in self.table.iter() {
            let module_type = entry.identity.module_type;
            if !entry.active || !module_type.is_io() {
                continue;
            }
            if !self.hal.start_driver(module_type, index) {
                warn!(
                    "[Bridge] No driver for {} at address {}.",
                    module_type, entry.address
                );
            }
        }

        shared.state = BridgeState::Running;
        info!("[Bridge] Running with {} table rows.", self.table.len());
    }

    fn dispatch(&mut self, shared: &mut SharedState, current_time_us: u64) {
        let Some(core) = self.core else {
            return;
        };
        let outcome = self.dispatcher.run_cycle(
            &mut self.hal,
            &mut self.table,
            &mut self.image,
            &core,
            &mut shared.status,
            current_time_us,
        );
        shared.aggregate_errors = outcome.aggregate_errors;
        if outcome.stop_requested {
            error!(
                "[Bridge] Error limit exceeded ({} errors), stopping. Reset required.",
                outcome.aggregate_errors
            );
            shared.state = BridgeState::Stopped;
        }
        self.last_dispatch = Some(outcome);
    }

    /// Sends the pending maintenance command once. Its result is ignored.
    fn run_maintenance(&mut self, shared: &mut SharedState) {
        let Some(action) = shared.pending_action.take() else {
            return;
        };
        info!("[Bridge] Executing maintenance action {:?}.", action);
        if let Err(e) = self.bus.exchange(
            &mut self.hal,
            action.address(),
            action.command(),
            &action.payload(),
        ) {
            debug!("[Bridge] Maintenance action answered with {} (ignored).", e);
        }
    }

    /// Mirrors entering or leaving `Running` onto the status flag and the fault indicator.
    fn apply_running(&mut self, shared: &mut SharedState) {
        let running = shared.state.is_running();
        if running == self.running_applied {
            return;
        }
        self.running_applied = running;
        if running {
            shared.status.insert(StatusFlags::RUNNING);
        } else {
            shared.status.remove(StatusFlags::RUNNING);
        }
        self.hal.set_indicator(Indicator::Fault, !running);
        debug!("[Bridge] Running flag set to {}.", running);
    }

    /// Writes the status byte and reflects LED changes once the core block is anchored.
    fn publish(&mut self, shared: &SharedState) {
        let Some(core) = self.core else {
            return;
        };
        if let Err(e) = core.write_status(&mut self.image, shared.status) {
            warn!("[Bridge] Could not publish status: {}", e);
        }
        match core.read_led(&self.image) {
            Ok(led) if self.last_led != Some(led) => {
                for (bit, indicator) in LED_BITS.iter().enumerate() {
                    self.hal.set_indicator(*indicator, led & (1 << bit) != 0);
                }
                self.last_led = Some(led);
            }
            Ok(_) => {}
            Err(e) => warn!("[Bridge] Could not read LED state: {}", e),
        }
    }

    // --- Accessors ---

    /// A handle usable from other execution contexts.
    pub fn control(&self) -> Arc<BridgeControl> {
        Arc::clone(&self.control)
    }

    pub fn state(&self) -> BridgeState {
        self.control.state()
    }

    pub fn status(&self) -> StatusFlags {
        self.control.status()
    }

    pub fn table(&self) -> &DeviceTable {
        &self.table
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn image(&self) -> &ProcessImage {
        &self.image
    }

    /// Application side of the process image (outputs, LED byte, error limits).
    pub fn image_mut(&mut self) -> &mut ProcessImage {
        &mut self.image
    }

    pub fn core_image(&self) -> Option<CoreImage> {
        self.core
    }

    pub fn declared(&self) -> &[DeclaredEntry] {
        &self.declared
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.last_report.as_ref()
    }

    pub fn last_dispatch(&self) -> Option<&DispatchOutcome> {
        self.last_dispatch.as_ref()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }
}
