//! The [`PlatformOps`] capability trait and platform selection.
//!
//! One implementation per supported OS. Each method is a thin, observable
//! probe or action; probes swallow their own errors and answer with a
//! boolean or `None`, so the sequencing layer never has to branch on the
//! platform or on probe failure modes.

use planetsync_core::Platform;

use crate::error::ServiceError;
use crate::macos::MacOps;
use crate::windows::WindowsOps;

/// Role marker the peer listing must contain (case-insensitively) once the
/// new planet file has taken effect.
pub const PLANET_ROLE_MARKER: &str = "PLANET";

/// TCP port the mesh service listens on; used as a liveness signal.
pub const SERVICE_PORT: u16 = 9993;

/// Name of the mesh client's own CLI binary.
pub const CLIENT_CLI: &str = "zerotier-cli";

/// Outcome of delivering a termination signal to a single PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was delivered.
    Delivered,
    /// The process was already gone — a race with normal exit, not an error.
    NoSuchProcess,
    /// The signal could not be delivered.
    Failed(String),
}

/// OS-specific probes and actions for the mesh client's service and GUI.
///
/// Implementations must be cheap to call repeatedly: PIDs are discovered
/// fresh on every query and never cached.
pub trait PlatformOps: Send + Sync {
    fn platform(&self) -> Platform;

    /// Multi-signal liveness check for the background service. Any positive
    /// signal means running; absence of all means stopped.
    fn service_running(&self) -> bool;

    /// PID of the background service, if discoverable.
    fn service_pid(&self) -> Option<u32>;

    fn gui_running(&self) -> bool;

    fn gui_pid(&self) -> Option<u32>;

    /// Ask the service manager to start/load the service. `true` means the
    /// command was accepted, not that the service is running yet.
    fn start_service(&self) -> bool;

    /// Ask the service manager to stop/unload the service.
    fn stop_service(&self) -> bool;

    /// Gracefully terminate the GUI front-end.
    fn stop_gui(&self) -> bool;

    /// Launch the GUI front-end.
    fn start_gui(&self) -> bool;

    /// Deliver a termination signal to one PID (polite, or forceful).
    fn signal_pid(&self, pid: u32, force: bool) -> SignalOutcome;

    /// Direct process-table lookup for one PID.
    fn pid_alive(&self, pid: u32) -> bool;

    /// Run the client's peer listing and search for the root-server role
    /// marker.
    fn verify_peers(&self) -> bool;

    /// Whether the GUI must be launched as a separate step after a service
    /// start (true where service and GUI lifecycles are fully decoupled).
    fn gui_launch_decoupled(&self) -> bool;
}

/// Select the ops implementation for the current OS, once, at startup.
pub fn ops_for_current_platform() -> Result<Box<dyn PlatformOps>, ServiceError> {
    match Platform::current()? {
        Platform::MacOs => Ok(Box::new(MacOps::new())),
        Platform::Windows => Ok(Box::new(WindowsOps::new())),
    }
}

/// Extract the first unsigned integer appearing in `text`.
pub(crate) fn first_number(text: &str) -> Option<u32> {
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            break;
        }
    }
    current.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_finds_leading_and_embedded_pids() {
        assert_eq!(first_number("1234"), Some(1234));
        assert_eq!(first_number("  \"PID\" = 987;"), Some(987));
        assert_eq!(first_number("no digits"), None);
    }

    #[test]
    fn selection_errors_on_unsupported_hosts() {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            assert!(ops_for_current_platform().is_ok());
        } else {
            assert!(matches!(
                ops_for_current_platform(),
                Err(ServiceError::Platform(_))
            ));
        }
    }
}
