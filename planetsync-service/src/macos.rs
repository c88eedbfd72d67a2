//! macOS implementation of [`PlatformOps`].
//!
//! The background service is a launchd daemon; the GUI is an app bundle
//! whose lifecycle is fully decoupled from the service. Liveness combines
//! three independent signals: the launchd registry, a client CLI
//! round-trip, and the service's listening port.

use std::time::Duration;

use planetsync_core::Platform;

use crate::command::{run, DEFAULT_TIMEOUT};
use crate::platform::{
    first_number, PlatformOps, SignalOutcome, CLIENT_CLI, PLANET_ROLE_MARKER, SERVICE_PORT,
};

const LAUNCHD_LABEL: &str = "com.zerotier.one";
const LAUNCHD_PLIST: &str = "/Library/LaunchDaemons/com.zerotier.one.plist";
const GUI_APP: &str = "/Applications/ZeroTier.app";

pub(crate) struct MacOps;

impl MacOps {
    pub(crate) fn new() -> Self {
        Self
    }

    fn launchd_query(&self) -> Option<String> {
        let exec = run("launchctl", &["list", LAUNCHD_LABEL], DEFAULT_TIMEOUT);
        exec.success.then_some(exec.output)
    }
}

impl PlatformOps for MacOps {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn service_running(&self) -> bool {
        // Signal 1: launchd knows the job and it has a PID.
        if let Some(listing) = self.launchd_query() {
            if listing.contains("PID") {
                tracing::debug!("service detected via launchd");
                return true;
            }
        }

        // Signal 2: the client CLI can reach the running service.
        if run(CLIENT_CLI, &["info"], DEFAULT_TIMEOUT).success {
            tracing::debug!("service detected via client CLI");
            return true;
        }

        // Signal 3: something owns the service port.
        let port_arg = format!(":{SERVICE_PORT}");
        let exec = run("lsof", &["-i", &port_arg], DEFAULT_TIMEOUT);
        if exec.success && exec.output.to_lowercase().contains("zerotier") {
            tracing::debug!("service detected via listening port");
            return true;
        }

        false
    }

    fn service_pid(&self) -> Option<u32> {
        if let Some(listing) = self.launchd_query() {
            for line in listing.lines() {
                if line.contains("\"PID\"") {
                    if let Some(pid) = first_number(line) {
                        return Some(pid);
                    }
                }
            }
        }

        let port_arg = format!(":{SERVICE_PORT}");
        let exec = run("lsof", &["-t", "-i", &port_arg], DEFAULT_TIMEOUT);
        if exec.success {
            if let Some(pid) = exec.output.lines().next().and_then(first_number) {
                return Some(pid);
            }
        }
        None
    }

    fn gui_running(&self) -> bool {
        let exec = run("pgrep", &["-f", GUI_APP], DEFAULT_TIMEOUT);
        exec.success && !exec.output.is_empty()
    }

    fn gui_pid(&self) -> Option<u32> {
        let exec = run("pgrep", &["-f", GUI_APP], DEFAULT_TIMEOUT);
        if !exec.success {
            return None;
        }
        exec.output.lines().next().and_then(first_number)
    }

    fn start_service(&self) -> bool {
        let exec = run("launchctl", &["load", LAUNCHD_PLIST], DEFAULT_TIMEOUT);
        // launchd reports an error when the job is already loaded; that is
        // success for our purposes.
        exec.success || exec.output.to_lowercase().contains("already loaded")
    }

    fn stop_service(&self) -> bool {
        run("launchctl", &["unload", LAUNCHD_PLIST], DEFAULT_TIMEOUT).success
    }

    fn stop_gui(&self) -> bool {
        run("pkill", &["-f", GUI_APP], DEFAULT_TIMEOUT).success
    }

    fn start_gui(&self) -> bool {
        run("open", &[GUI_APP], DEFAULT_TIMEOUT).success
    }

    fn signal_pid(&self, pid: u32, force: bool) -> SignalOutcome {
        let signal = if force { "-9" } else { "-TERM" };
        let pid_arg = pid.to_string();
        let exec = run("kill", &[signal, &pid_arg], DEFAULT_TIMEOUT);
        if exec.success {
            SignalOutcome::Delivered
        } else if exec.output.contains("No such process") {
            SignalOutcome::NoSuchProcess
        } else {
            SignalOutcome::Failed(exec.output)
        }
    }

    fn pid_alive(&self, pid: u32) -> bool {
        let pid_arg = pid.to_string();
        run("kill", &["-0", &pid_arg], Duration::from_secs(5)).success
    }

    fn verify_peers(&self) -> bool {
        let exec = run(CLIENT_CLI, &["peers"], DEFAULT_TIMEOUT);
        if !exec.success {
            tracing::error!(output = %exec.output, "peer listing failed");
            return false;
        }
        exec.output.to_uppercase().contains(PLANET_ROLE_MARKER)
    }

    fn gui_launch_decoupled(&self) -> bool {
        true
    }
}
