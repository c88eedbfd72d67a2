//! Platform-agnostic stop/start sequencing for the mesh client.
//!
//! ## Stop sequence
//!
//! 1. GUI first: graceful terminate, poll until its process disappears.
//! 2. Service manager unload/stop, poll until no liveness signal remains.
//! 3. Escalation: any PID still discoverable gets a polite terminate, a
//!    bounded wait, then a forceful one. A PID that vanishes between
//!    signals is a race with normal exit, counted as success.
//!
//! Stop fails only when a forceful signal itself errors and the process is
//! still discoverable afterwards. Stopping an already-stopped client is a
//! no-op success.
//!
//! ## Start sequence
//!
//! Skip straight to the GUI when the service already runs; otherwise ask
//! the service manager to start it, poll for the running signal, and let
//! the service settle before trusting it. GUI launch failure is a warning;
//! the service not reaching running is a hard error.

use std::time::Duration;

use planetsync_core::ServiceState;

use crate::error::ServiceError;
use crate::platform::{ops_for_current_platform, PlatformOps, SignalOutcome};

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// Poll budgets and settle delays for the sequencing loops.
///
/// Expressed in ticks of `poll_tick` so tests can shrink every wait to
/// nothing without touching the sequencing logic.
#[derive(Debug, Clone)]
pub struct Timings {
    /// One polling step.
    pub poll_tick: Duration,
    /// Ticks to wait for the GUI to exit after a graceful terminate.
    pub gui_stop_ticks: u32,
    /// Ticks to wait for the service to vanish after a manager stop.
    pub service_stop_ticks: u32,
    /// Ticks to wait after a polite per-PID terminate.
    pub term_ticks: u32,
    /// Ticks to wait after a forceful per-PID terminate.
    pub kill_ticks: u32,
    /// Ticks to wait for the running signal after a manager start.
    pub start_ticks: u32,
    /// Settle delay once the running signal appears.
    pub start_settle: Duration,
    /// Ticks to wait for the GUI process after launching it.
    pub gui_start_ticks: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_tick: Duration::from_secs(1),
            gui_stop_ticks: 3,
            service_stop_ticks: 3,
            term_ticks: 10,
            kill_ticks: 3,
            start_ticks: 15,
            start_settle: Duration::from_secs(3),
            gui_start_ticks: 15,
        }
    }
}

impl Timings {
    /// All waits collapsed to zero.
    pub fn immediate() -> Self {
        Self {
            poll_tick: Duration::ZERO,
            start_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Sequencing layer over a [`PlatformOps`] implementation.
pub struct Controller {
    ops: Box<dyn PlatformOps>,
    timings: Timings,
}

impl Controller {
    /// Build a controller for the current OS with production timings.
    pub fn for_current_platform() -> Result<Self, ServiceError> {
        Ok(Self::new(ops_for_current_platform()?, Timings::default()))
    }

    /// Build a controller over explicit ops and timings.
    pub fn new(ops: Box<dyn PlatformOps>, timings: Timings) -> Self {
        Self { ops, timings }
    }

    /// Current observed state of the background service.
    pub fn state(&self) -> ServiceState {
        if self.ops.service_running() {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        }
    }

    /// Whether the background service is running. GUI state is excluded.
    pub fn check_status(&self) -> bool {
        self.ops.service_running()
    }

    /// Whether the peer listing currently shows the root-server role.
    ///
    /// No internal retry — callers that need one bring their own loop.
    pub fn verify_peers(&self) -> bool {
        self.ops.verify_peers()
    }

    /// Whether the platform needs the GUI launched as a separate step.
    pub fn gui_launch_decoupled(&self) -> bool {
        self.ops.gui_launch_decoupled()
    }

    /// Launch the GUI and poll briefly for its process.
    pub fn launch_gui(&self) -> bool {
        if !self.ops.start_gui() {
            tracing::warn!("GUI launch command failed");
            return false;
        }
        if self.poll(self.timings.gui_start_ticks, || self.ops.gui_running()) {
            tracing::info!("GUI front-end is up");
            true
        } else {
            tracing::warn!("GUI launch command accepted but no process detected");
            false
        }
    }

    /// Run the full stop sequence.
    pub fn stop(&self) -> Result<(), ServiceError> {
        let gui_running = self.ops.gui_running();
        let service_running = self.ops.service_running();

        if !gui_running && !service_running {
            tracing::info!("mesh client already stopped");
            return Ok(());
        }

        tracing::info!(gui = gui_running, service = service_running, state = %ServiceState::Stopping, "stopping mesh client");

        if gui_running {
            if self.ops.stop_gui() {
                if self.poll(self.timings.gui_stop_ticks, || !self.ops.gui_running()) {
                    tracing::info!("GUI front-end stopped");
                } else {
                    tracing::warn!("GUI still detected after graceful terminate");
                }
            } else {
                tracing::warn!("GUI terminate command failed");
            }
        }

        if self.ops.service_running() {
            if self.ops.stop_service() {
                if self.poll(self.timings.service_stop_ticks, || {
                    !self.ops.service_running()
                }) {
                    tracing::info!("background service stopped");
                } else {
                    tracing::warn!("service manager stop accepted but service still detected");
                }
            } else {
                tracing::warn!("service manager stop command failed");
            }
        }

        // Escalate on whatever is still discoverable. PIDs are looked up
        // fresh; stale handles from before the graceful steps are useless.
        let mut survivors = Vec::new();
        for (label, pid) in [
            ("gui", self.ops.gui_pid()),
            ("service", self.ops.service_pid()),
        ] {
            let Some(pid) = pid else { continue };
            tracing::warn!(label, pid, "process survived graceful stop; escalating");
            if !self.terminate_pid(pid) {
                survivors.push(pid);
            }
        }

        if survivors.is_empty() {
            tracing::info!("mesh client fully stopped");
            Ok(())
        } else {
            Err(ServiceError::StopFailed { pids: survivors })
        }
    }

    /// Run the full start sequence.
    pub fn start(&self) -> Result<(), ServiceError> {
        if self.ops.service_running() {
            tracing::info!("background service already running");
        } else {
            tracing::info!(state = %ServiceState::Starting, "starting background service");
            if !self.ops.start_service() {
                tracing::warn!("service manager start command failed");
            }

            if self.poll(self.timings.start_ticks, || self.ops.service_running()) {
                // Give the service time to finish internal initialization
                // before anything trusts it.
                std::thread::sleep(self.timings.start_settle);
                tracing::info!("background service is up");
            } else {
                tracing::warn!("timed out waiting for the service to come up");
            }
        }

        if !self.launch_gui() {
            tracing::warn!("GUI failed to launch; service may still be healthy");
        }

        if self.ops.service_running() {
            Ok(())
        } else {
            Err(ServiceError::StartFailed)
        }
    }

    /// Polite terminate, bounded wait, forceful terminate, bounded wait.
    ///
    /// Returns `true` unless a forceful signal errored while the process
    /// remained discoverable.
    fn terminate_pid(&self, pid: u32) -> bool {
        match self.ops.signal_pid(pid, false) {
            SignalOutcome::Delivered => {
                if self.poll(self.timings.term_ticks, || !self.ops.pid_alive(pid)) {
                    tracing::info!(pid, "process exited after polite terminate");
                    return true;
                }
                tracing::warn!(pid, "process ignored polite terminate");
            }
            SignalOutcome::NoSuchProcess => return true,
            SignalOutcome::Failed(reason) => {
                tracing::warn!(pid, %reason, "polite terminate failed");
            }
        }

        match self.ops.signal_pid(pid, true) {
            SignalOutcome::Delivered | SignalOutcome::NoSuchProcess => {
                self.poll(self.timings.kill_ticks, || !self.ops.pid_alive(pid));
                true
            }
            SignalOutcome::Failed(reason) => {
                tracing::error!(pid, %reason, "forceful terminate failed");
                !self.ops.pid_alive(pid)
            }
        }
    }

    /// Check `condition` immediately, then up to `ticks` more times with a
    /// tick-long sleep between checks.
    fn poll(&self, ticks: u32, condition: impl Fn() -> bool) -> bool {
        if condition() {
            return true;
        }
        for _ in 0..ticks {
            std::thread::sleep(self.timings.poll_tick);
            if condition() {
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use planetsync_core::Platform;

    /// Scripted ops: booleans describe the world, a log records the calls.
    #[derive(Default)]
    struct FakeState {
        service_running: bool,
        gui_running: bool,
        service_pid: Option<u32>,
        gui_pid: Option<u32>,
        /// stop_service flips service_running off when true.
        stop_service_works: bool,
        /// stop_gui flips gui_running off when true.
        stop_gui_works: bool,
        /// start_service flips service_running on when true.
        start_service_works: bool,
        /// Polite signals kill their target when true.
        term_kills: bool,
        /// Forceful signals error out when true.
        kill_errors: bool,
        peers_visible: bool,
        calls: Vec<String>,
    }

    struct FakeOps(Arc<Mutex<FakeState>>);

    impl PlatformOps for FakeOps {
        fn platform(&self) -> Platform {
            Platform::MacOs
        }

        fn service_running(&self) -> bool {
            self.0.lock().unwrap().service_running
        }

        fn service_pid(&self) -> Option<u32> {
            self.0.lock().unwrap().service_pid
        }

        fn gui_running(&self) -> bool {
            self.0.lock().unwrap().gui_running
        }

        fn gui_pid(&self) -> Option<u32> {
            self.0.lock().unwrap().gui_pid
        }

        fn start_service(&self) -> bool {
            let mut s = self.0.lock().unwrap();
            s.calls.push("start_service".into());
            if s.start_service_works {
                s.service_running = true;
            }
            true
        }

        fn stop_service(&self) -> bool {
            let mut s = self.0.lock().unwrap();
            s.calls.push("stop_service".into());
            if s.stop_service_works {
                s.service_running = false;
                s.service_pid = None;
            }
            true
        }

        fn stop_gui(&self) -> bool {
            let mut s = self.0.lock().unwrap();
            s.calls.push("stop_gui".into());
            if s.stop_gui_works {
                s.gui_running = false;
                s.gui_pid = None;
            }
            true
        }

        fn start_gui(&self) -> bool {
            let mut s = self.0.lock().unwrap();
            s.calls.push("start_gui".into());
            s.gui_running = true;
            true
        }

        fn signal_pid(&self, pid: u32, force: bool) -> SignalOutcome {
            let mut s = self.0.lock().unwrap();
            s.calls.push(format!("signal:{pid}:{force}"));
            if force && s.kill_errors {
                return SignalOutcome::Failed("operation not permitted".into());
            }
            if force || s.term_kills {
                if s.service_pid == Some(pid) {
                    s.service_pid = None;
                    s.service_running = false;
                }
                if s.gui_pid == Some(pid) {
                    s.gui_pid = None;
                    s.gui_running = false;
                }
            }
            SignalOutcome::Delivered
        }

        fn pid_alive(&self, pid: u32) -> bool {
            let s = self.0.lock().unwrap();
            s.service_pid == Some(pid) || s.gui_pid == Some(pid)
        }

        fn verify_peers(&self) -> bool {
            self.0.lock().unwrap().peers_visible
        }

        fn gui_launch_decoupled(&self) -> bool {
            true
        }
    }

    fn controller(state: FakeState) -> (Controller, Arc<Mutex<FakeState>>) {
        let shared = Arc::new(Mutex::new(state));
        let ops = Box::new(FakeOps(shared.clone()));
        (Controller::new(ops, Timings::immediate()), shared)
    }

    fn calls(shared: &Arc<Mutex<FakeState>>) -> Vec<String> {
        shared.lock().unwrap().calls.clone()
    }

    #[test]
    fn stop_is_idempotent_when_nothing_runs() {
        let (controller, ptr) = controller(FakeState::default());
        controller.stop().expect("stop should succeed");
        assert!(calls(&ptr).is_empty(), "no commands for an already-stopped client");
    }

    #[test]
    fn stop_terminates_gui_before_service() {
        let (controller, ptr) = controller(FakeState {
            service_running: true,
            gui_running: true,
            stop_service_works: true,
            stop_gui_works: true,
            ..FakeState::default()
        });
        controller.stop().expect("stop");
        assert_eq!(calls(&ptr), vec!["stop_gui", "stop_service"]);
    }

    #[test]
    fn stop_escalates_to_signals_for_stubborn_pids() {
        let (controller, ptr) = controller(FakeState {
            service_running: true,
            service_pid: Some(41),
            stop_service_works: false,
            term_kills: true,
            ..FakeState::default()
        });
        controller.stop().expect("stop via escalation");
        assert!(calls(&ptr).contains(&"signal:41:false".to_string()));
    }

    #[test]
    fn stop_uses_forceful_signal_when_polite_is_ignored() {
        let (controller, ptr) = controller(FakeState {
            service_running: true,
            service_pid: Some(41),
            stop_service_works: false,
            term_kills: false,
            ..FakeState::default()
        });
        controller.stop().expect("forceful stop");
        let log = calls(&ptr);
        assert!(log.contains(&"signal:41:false".to_string()));
        assert!(log.contains(&"signal:41:true".to_string()));
    }

    #[test]
    fn stop_fails_only_when_forceful_signal_errors_and_pid_survives() {
        let (controller, _) = controller(FakeState {
            service_running: true,
            service_pid: Some(41),
            stop_service_works: false,
            term_kills: false,
            kill_errors: true,
            ..FakeState::default()
        });
        match controller.stop() {
            Err(ServiceError::StopFailed { pids }) => assert_eq!(pids, vec![41]),
            other => panic!("expected StopFailed, got {other:?}"),
        }
    }

    #[test]
    fn start_skips_service_when_already_running() {
        let (controller, ptr) = controller(FakeState {
            service_running: true,
            ..FakeState::default()
        });
        controller.start().expect("start");
        let log = calls(&ptr);
        assert!(!log.contains(&"start_service".to_string()));
        assert!(log.contains(&"start_gui".to_string()));
    }

    #[test]
    fn start_succeeds_once_service_reports_running() {
        let (controller, ptr) = controller(FakeState {
            start_service_works: true,
            ..FakeState::default()
        });
        controller.start().expect("start");
        assert!(calls(&ptr).contains(&"start_service".to_string()));
    }

    #[test]
    fn start_fails_hard_when_service_never_comes_up() {
        let (controller, _) = controller(FakeState {
            start_service_works: false,
            ..FakeState::default()
        });
        assert!(matches!(controller.start(), Err(ServiceError::StartFailed)));
    }

    #[test]
    fn status_reflects_service_only() {
        let (controller, _) = controller(FakeState {
            gui_running: true,
            ..FakeState::default()
        });
        assert!(!controller.check_status(), "GUI alone is not 'running'");
        assert_eq!(controller.state(), ServiceState::Stopped);
    }

    #[test]
    fn verify_peers_passes_through_ops() {
        let (seeing, _) = controller(FakeState {
            peers_visible: true,
            ..FakeState::default()
        });
        let (blind, _) = controller(FakeState::default());
        assert!(seeing.verify_peers());
        assert!(!blind.verify_peers());
    }
}
