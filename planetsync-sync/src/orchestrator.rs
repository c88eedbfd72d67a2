//! The reconciliation orchestrator.
//!
//! `update_planet_file` runs the fixed transaction: download → stop →
//! replace → start → verify, expressed as an ordered step list (see
//! [`crate::steps`]) so the Fatal/BestEffort split is explicit. The update
//! succeeds exactly when download, replace, and start succeed; every other
//! step only affects the log and the warning list.
//!
//! `run_once` wraps detection around it and persists the new snapshot
//! *before* attempting the swap — detection state and swap state are
//! deliberately decoupled, so a crash mid-swap cannot replay the same
//! change forever once the underlying fault is fixed.

use std::time::Duration;

use planetsync_core::{Config, Platform, Transport};
use planetsync_detector::{Detection, IpMonitor};
use planetsync_service::Controller;

use crate::error::SyncError;
use crate::replacer::{self, Replacer};
use crate::steps::{drive, Step, UpdateReport};

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// Settle delays and the peer-verification retry budget.
#[derive(Debug, Clone)]
pub struct OrchestratorTimings {
    /// Wait after stopping, for the service to release file locks.
    pub stop_settle: Duration,
    /// Wait after starting, for full initialization.
    pub start_settle: Duration,
    /// Peer-verification attempts.
    pub peer_attempts: u32,
    /// Wait before each peer-verification attempt.
    pub peer_retry_delay: Duration,
}

impl Default for OrchestratorTimings {
    fn default() -> Self {
        Self {
            stop_settle: Duration::from_secs(3),
            start_settle: Duration::from_secs(5),
            peer_attempts: 3,
            peer_retry_delay: Duration::from_secs(2),
        }
    }
}

impl OrchestratorTimings {
    /// All waits collapsed to zero.
    pub fn immediate() -> Self {
        Self {
            stop_settle: Duration::ZERO,
            start_settle: Duration::ZERO,
            peer_retry_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Outcome of one `run_once` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A change was detected and the update transaction succeeded.
    Updated,
    /// A change was detected but the update transaction failed.
    UpdateFailed,
    /// No change (or detection could not complete).
    NoChange,
}

/// Sequences Detector → Replacer → Controller into the update transaction.
pub struct Orchestrator {
    config: Config,
    transport: Transport,
    monitor: IpMonitor,
    controller: Controller,
    replacer: Replacer,
    timings: OrchestratorTimings,
}

impl Orchestrator {
    /// Build the production wiring for the current platform.
    pub fn new(config: Config) -> Result<Self, SyncError> {
        let platform = Platform::current()?;
        let planet_path = config.planet_path()?;
        let controller = Controller::for_current_platform()?;
        let replacer = Replacer::new(platform, planet_path);
        Ok(Self::with_parts(
            config,
            controller,
            replacer,
            OrchestratorTimings::default(),
        ))
    }

    /// Build from explicit parts.
    pub fn with_parts(
        config: Config,
        controller: Controller,
        replacer: Replacer,
        timings: OrchestratorTimings,
    ) -> Self {
        let transport = Transport::from_config(&config);
        let monitor = IpMonitor::new(&config);
        Self {
            config,
            transport,
            monitor,
            controller,
            replacer,
            timings,
        }
    }

    /// Run the full update transaction. Never panics or propagates — the
    /// report is the only outcome.
    pub fn update_planet_file(&self) -> UpdateReport {
        let staged = self.config.staged_planet_path();
        let planet_url = self.config.planet_url();

        tracing::info!("starting planet file update");

        let steps = vec![
            Step::fatal("download planet file", || {
                self.transport
                    .download_to(&planet_url, &staged)
                    .map_err(|e| e.to_string())?;
                if replacer::verify_integrity(&staged, None) {
                    Ok(())
                } else {
                    Err(SyncError::Integrity {
                        path: staged.clone(),
                    }
                    .to_string())
                }
            }),
            // A stuck service must not block getting the new file in place.
            Step::best_effort("stop mesh client", || {
                self.controller.stop().map_err(|e| e.to_string())
            }),
            Step::best_effort("settle after stop", || {
                std::thread::sleep(self.timings.stop_settle);
                Ok(())
            }),
            Step::fatal("replace planet file", || {
                self.replacer
                    .replace(&staged)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }),
            Step::fatal("start mesh client", || {
                self.controller.start().map_err(|e| e.to_string())
            }),
            Step::best_effort("settle after start", || {
                std::thread::sleep(self.timings.start_settle);
                Ok(())
            }),
            Step::best_effort("check service status", || {
                if self.controller.check_status() {
                    Ok(())
                } else {
                    Err("service not reporting running".to_string())
                }
            }),
            Step::best_effort("verify peer connectivity", || self.verify_peers_with_retry()),
            Step::best_effort("launch GUI front-end", || {
                if !self.controller.gui_launch_decoupled() {
                    return Ok(());
                }
                if self.controller.launch_gui() {
                    Ok(())
                } else {
                    Err("GUI front-end failed to launch".to_string())
                }
            }),
            Step::best_effort("prune old backups", || {
                let removed = self.replacer.cleanup_old_backups();
                if removed > 0 {
                    tracing::info!(removed, "pruned old planet backups");
                }
                Ok(())
            }),
        ];

        let report = drive(steps);
        if report.success {
            tracing::info!(
                warnings = report.warnings().len(),
                "planet file update complete",
            );
        } else {
            tracing::error!("planet file update failed");
        }
        report
    }

    /// One detect-and-update cycle.
    pub fn run_once(&self) -> RunOutcome {
        tracing::info!("checking for rendezvous IP changes");

        match self.monitor.detect() {
            Detection::Unchanged => {
                tracing::info!("no IP change; nothing to do");
                RunOutcome::NoChange
            }
            Detection::Changed { content } => {
                // Persist before swapping: a crash mid-swap must not replay
                // the same detection forever.
                if let Err(err) = self.monitor.record_snapshot(&content) {
                    tracing::error!(error = %err, "could not persist IP snapshot");
                    return RunOutcome::UpdateFailed;
                }

                if self.update_planet_file().success {
                    RunOutcome::Updated
                } else {
                    RunOutcome::UpdateFailed
                }
            }
        }
    }

    /// Skip detection and always swap.
    pub fn force_update(&self) -> bool {
        tracing::info!("forcing planet file update");

        match self.monitor.fetch_remote() {
            Ok(content) => {
                if let Err(err) = self.monitor.record_snapshot(&content) {
                    tracing::error!(error = %err, "could not persist IP snapshot");
                    return false;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "could not fetch remote IP list");
                return false;
            }
        }

        self.update_planet_file().success
    }

    fn verify_peers_with_retry(&self) -> Result<(), String> {
        for attempt in 1..=self.timings.peer_attempts {
            std::thread::sleep(self.timings.peer_retry_delay);
            if self.controller.verify_peers() {
                tracing::info!(attempt, "root-server role visible in peer list");
                return Ok(());
            }
            tracing::debug!(attempt, "root-server role not visible yet");
        }
        Err("root-server role not visible in peer list".to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use planetsync_core::IpSet;
    use planetsync_service::{PlatformOps, SignalOutcome, Timings};

    // ── Fixture server ──────────────────────────────────────────────────────

    /// Serve `/ips*` and `/planet*` with fixed bodies for up to `hits`
    /// sequential requests.
    fn serve_routes(ips: &'static str, planet: &'static str, hits: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        std::thread::spawn(move || {
            for stream in listener.incoming().take(hits) {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 1024];
                let read = stream.read(&mut buf).unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..read]);
                let body = if request.starts_with("GET /planet") {
                    planet
                } else {
                    ips
                };
                let response = format!(
                    "HTTP/1.0 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body,
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    // ── Scripted platform ops ───────────────────────────────────────────────

    struct Inner {
        running: bool,
        stop_works: bool,
        start_works: bool,
        peers: bool,
        pid: Option<u32>,
    }

    struct ScriptedOps(Arc<Mutex<Inner>>);

    impl PlatformOps for ScriptedOps {
        fn platform(&self) -> Platform {
            Platform::MacOs
        }
        fn service_running(&self) -> bool {
            self.0.lock().unwrap().running
        }
        fn service_pid(&self) -> Option<u32> {
            self.0.lock().unwrap().pid
        }
        fn gui_running(&self) -> bool {
            false
        }
        fn gui_pid(&self) -> Option<u32> {
            None
        }
        fn start_service(&self) -> bool {
            let mut s = self.0.lock().unwrap();
            if s.start_works {
                s.running = true;
            }
            true
        }
        fn stop_service(&self) -> bool {
            let mut s = self.0.lock().unwrap();
            if s.stop_works {
                s.running = false;
                s.pid = None;
            }
            s.stop_works
        }
        fn stop_gui(&self) -> bool {
            true
        }
        fn start_gui(&self) -> bool {
            true
        }
        fn signal_pid(&self, _pid: u32, _force: bool) -> SignalOutcome {
            let s = self.0.lock().unwrap();
            if s.stop_works {
                SignalOutcome::NoSuchProcess
            } else {
                SignalOutcome::Failed("refused".to_string())
            }
        }
        fn pid_alive(&self, pid: u32) -> bool {
            self.0.lock().unwrap().pid == Some(pid)
        }
        fn verify_peers(&self) -> bool {
            self.0.lock().unwrap().peers
        }
        fn gui_launch_decoupled(&self) -> bool {
            false
        }
    }

    fn compliant_ops() -> Inner {
        Inner {
            running: false,
            stop_works: true,
            start_works: true,
            peers: true,
            pid: None,
        }
    }

    fn orchestrator_at(root: &Path, install: &Path, base_url: String, inner: Inner) -> Orchestrator {
        let config = Config {
            base_url,
            max_retries: 0,
            download_timeout: 2,
            state_root: root.to_path_buf(),
            install_dir: Some(install.to_path_buf()),
            ..Config::default()
        };
        let controller = Controller::new(
            Box::new(ScriptedOps(Arc::new(Mutex::new(inner)))),
            Timings::immediate(),
        );
        let replacer = Replacer::new(Platform::MacOs, install.join("planet"));
        Orchestrator::with_parts(config, controller, replacer, OrchestratorTimings::immediate())
    }

    // ── run_once ────────────────────────────────────────────────────────────

    #[test]
    fn run_once_swaps_and_persists_snapshot_on_change() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let url = serve_routes("203.0.113.1,\n203.0.113.2", "planet-v2-bytes", 8);

        let orch = orchestrator_at(root.path(), install.path(), url, compliant_ops());
        assert_eq!(orch.run_once(), RunOutcome::Updated);

        let planet = std::fs::read(install.path().join("planet")).unwrap();
        assert_eq!(planet, b"planet-v2-bytes");

        let snapshot = std::fs::read_to_string(root.path().join("ips")).unwrap();
        assert_eq!(snapshot, "203.0.113.1,\n203.0.113.2", "raw text, verbatim");
    }

    #[test]
    fn run_once_is_a_noop_without_changes() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let url = serve_routes("203.0.113.1", "planet-bytes", 8);

        planetsync_detector::snapshot::save(&root.path().join("ips"), "203.0.113.1,")
            .expect("seed snapshot");

        let orch = orchestrator_at(root.path(), install.path(), url, compliant_ops());
        assert_eq!(orch.run_once(), RunOutcome::NoChange);
        assert!(!install.path().join("planet").exists(), "no swap on no change");
    }

    #[test]
    fn run_once_persists_snapshot_even_when_swap_fails() {
        let root = TempDir::new().unwrap();
        let blocker = TempDir::new().unwrap();
        // Install "directory" is a regular file, so the replace step fails.
        let install = blocker.path().join("not-a-dir");
        std::fs::write(&install, "file in the way").unwrap();

        let url = serve_routes("198.51.100.7", "planet-bytes", 8);
        let orch = orchestrator_at(root.path(), &install, url, compliant_ops());

        assert_eq!(orch.run_once(), RunOutcome::UpdateFailed);

        // Detection state advanced anyway: the same change must not replay.
        let snapshot = std::fs::read_to_string(root.path().join("ips")).unwrap();
        assert_eq!(IpSet::parse(&snapshot), IpSet::parse("198.51.100.7"));
    }

    // ── update_planet_file ──────────────────────────────────────────────────

    #[test]
    fn update_succeeds_with_warning_when_stop_fails() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let url = serve_routes("203.0.113.9", "planet-bytes", 8);

        // Service refuses to stop and stays running throughout.
        let orch = orchestrator_at(
            root.path(),
            install.path(),
            url,
            Inner {
                running: true,
                stop_works: false,
                start_works: true,
                peers: true,
                pid: Some(77),
            },
        );

        let report = orch.update_planet_file();
        assert!(report.success, "a stuck service must not block the swap");
        assert!(
            report.warnings().iter().any(|w| w.contains("77")),
            "stop failure surfaces as a warning: {:?}",
            report.warnings()
        );
        assert!(install.path().join("planet").exists());
    }

    #[test]
    fn peer_verification_failure_only_warns() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let url = serve_routes("203.0.113.9", "planet-bytes", 8);

        let orch = orchestrator_at(
            root.path(),
            install.path(),
            url,
            Inner {
                peers: false,
                ..compliant_ops()
            },
        );

        let report = orch.update_planet_file();
        assert!(report.success);
        assert!(report
            .warnings()
            .iter()
            .any(|w| w.contains("root-server role")));
    }

    #[test]
    fn update_aborts_when_download_fails() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();

        // Refuses every connection.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let orch = orchestrator_at(root.path(), install.path(), url, compliant_ops());
        let report = orch.update_planet_file();

        assert!(!report.success);
        assert_eq!(report.steps.len(), 1, "fatal download failure stops step 1");
        assert!(!install.path().join("planet").exists());
    }

    #[test]
    fn steps_run_in_contract_order() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let url = serve_routes("203.0.113.9", "planet-bytes", 8);

        let orch = orchestrator_at(root.path(), install.path(), url, compliant_ops());
        let report = orch.update_planet_file();

        let names: Vec<&str> = report.steps.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "download planet file",
                "stop mesh client",
                "settle after stop",
                "replace planet file",
                "start mesh client",
                "settle after start",
                "check service status",
                "verify peer connectivity",
                "launch GUI front-end",
                "prune old backups",
            ]
        );
    }

    // ── force_update ────────────────────────────────────────────────────────

    #[test]
    fn force_update_swaps_without_detection() {
        let root = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let url = serve_routes("203.0.113.1", "planet-forced", 8);

        // Snapshot already matches the remote set; detection would be a
        // no-op, but force must swap anyway.
        planetsync_detector::snapshot::save(&root.path().join("ips"), "203.0.113.1")
            .expect("seed snapshot");

        let orch = orchestrator_at(root.path(), install.path(), url, compliant_ops());
        assert!(orch.force_update());
        assert_eq!(
            std::fs::read(install.path().join("planet")).unwrap(),
            b"planet-forced"
        );
    }
}
