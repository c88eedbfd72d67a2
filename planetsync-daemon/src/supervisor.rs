//! PID-file-based supervision of the background daemon process.
//!
//! The PID file under `<root>/run/` is a claim, not a fact: liveness is
//! always cross-checked against the OS. A record whose process is
//! confirmed absent is deleted on sight (self-healing stale state); a
//! probe that cannot decide — permission denied, probe failure — is
//! treated as "assume running" so we never double-start.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Serialize;

use crate::error::{io_err, DaemonError};
use crate::paths;

/// What to execute as the detached daemon process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SpawnSpec {
    /// The current executable, re-invoked as `daemon run`.
    pub fn for_daemon_run(interval: Option<u64>) -> Result<Self, DaemonError> {
        let program = std::env::current_exe().map_err(|e| io_err("current_exe", e))?;
        let mut args = vec!["daemon".to_string(), "run".to_string()];
        if let Some(interval) = interval {
            args.push("--interval".to_string());
            args.push(interval.to_string());
        }
        Ok(Self { program, args })
    }
}

/// Supervisor status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
    pub log_size: Option<u64>,
}

/// Manages one detached daemon process per state root.
pub struct Supervisor {
    root: PathBuf,
    spawn: SpawnSpec,
    startup_wait: Duration,
    poll_tick: Duration,
}

const STOP_TERM_TICKS: u32 = 10;
const STOP_KILL_TICKS: u32 = 5;

impl Supervisor {
    pub fn new(root: PathBuf, spawn: SpawnSpec) -> Self {
        Self {
            root,
            spawn,
            startup_wait: Duration::from_secs(2),
            poll_tick: Duration::from_secs(1),
        }
    }

    /// Shrink the startup wait and poll tick (faster stop/start loops).
    pub fn with_timing(mut self, startup_wait: Duration, poll_tick: Duration) -> Self {
        self.startup_wait = startup_wait;
        self.poll_tick = poll_tick;
        self
    }

    /// PID recorded on disk, if any.
    pub fn read_pid(&self) -> Option<u32> {
        let raw = std::fs::read_to_string(paths::pid_path(&self.root)).ok()?;
        raw.trim().parse().ok()
    }

    /// Whether a recorded daemon process is alive right now.
    ///
    /// Deletes the PID file when the process is confirmed absent.
    pub fn is_running(&self) -> bool {
        let Some(pid) = self.read_pid() else {
            return false;
        };
        if probe_alive(pid) {
            true
        } else {
            tracing::info!(pid, "stale daemon PID record; cleaning up");
            self.cleanup_pid_file();
            false
        }
    }

    /// Spawn the detached daemon and record its PID.
    pub fn start(&self) -> Result<u32, DaemonError> {
        if self.is_running() {
            let pid = self.read_pid().unwrap_or_default();
            return Err(DaemonError::AlreadyRunning { pid });
        }

        paths::ensure_runtime_dirs(&self.root).map_err(|e| io_err(&self.root, e))?;

        let log_path = paths::log_path(&self.root);
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| io_err(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| io_err(&log_path, e))?;

        let mut command = Command::new(&self.spawn.program);
        command
            .args(&self.spawn.args)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err);
        detach(&mut command);

        let child = command
            .spawn()
            .map_err(|e| DaemonError::SpawnFailed(format!("{}: {e}", self.spawn.program.display())))?;
        let pid = child.id();

        self.write_pid_file(pid)?;
        tracing::info!(pid, log = %log_path.display(), "daemon spawned");

        // The child may die immediately (bad config, port in use); verify
        // it survived before declaring success.
        std::thread::sleep(self.startup_wait);
        if self.is_running() {
            Ok(pid)
        } else {
            Err(DaemonError::SpawnFailed(format!(
                "daemon process {pid} exited during startup; see {}",
                log_path.display()
            )))
        }
    }

    /// Terminate the daemon: graceful signal, bounded wait, forceful
    /// signal, bounded wait. `Ok` when no daemon is running.
    pub fn stop(&self) -> Result<(), DaemonError> {
        let Some(pid) = self.read_pid() else {
            tracing::info!("daemon is not running");
            return Ok(());
        };

        tracing::info!(pid, "stopping daemon");
        terminate(pid, false);

        if self.wait_for_exit(pid, STOP_TERM_TICKS) {
            self.cleanup_pid_file();
            tracing::info!(pid, "daemon exited gracefully");
            return Ok(());
        }

        tracing::warn!(pid, "daemon unresponsive; escalating to forceful termination");
        terminate(pid, true);

        if self.wait_for_exit(pid, STOP_KILL_TICKS) {
            self.cleanup_pid_file();
            tracing::info!(pid, "daemon terminated");
            Ok(())
        } else {
            Err(DaemonError::StopFailed { pid })
        }
    }

    /// Status snapshot for the CLI.
    pub fn status(&self) -> SupervisorStatus {
        let running = self.is_running();
        let log_file = paths::log_path(&self.root);
        SupervisorStatus {
            running,
            pid: if running { self.read_pid() } else { None },
            pid_file: paths::pid_path(&self.root),
            log_size: std::fs::metadata(&log_file).map(|m| m.len()).ok(),
            log_file,
        }
    }

    fn wait_for_exit(&self, pid: u32, ticks: u32) -> bool {
        for _ in 0..ticks {
            if !probe_alive(pid) {
                return true;
            }
            std::thread::sleep(self.poll_tick);
        }
        !probe_alive(pid)
    }

    fn write_pid_file(&self, pid: u32) -> Result<(), DaemonError> {
        let path = paths::pid_path(&self.root);
        std::fs::write(&path, pid.to_string()).map_err(|e| io_err(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) =
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            {
                tracing::warn!(path = %path.display(), error = %err, "could not set PID file mode");
            }
        }

        Ok(())
    }

    fn cleanup_pid_file(&self) {
        let path = paths::pid_path(&self.root);
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::error!(path = %path.display(), error = %err, "could not remove PID file");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// OS probes and signals
// ---------------------------------------------------------------------------

/// Process-existence probe.
///
/// Conservative on ambiguity: a permission-denied signal probe defers to
/// the process table, and a failed probe reports "alive".
#[cfg(unix)]
fn probe_alive(pid: u32) -> bool {
    let pid_arg = pid.to_string();
    match Command::new("kill").args(["-0", &pid_arg]).output() {
        Ok(output) => {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.contains("permitted") {
                    // ESRCH: confirmed absent.
                    return false;
                }
                // Not ours to signal; the process table decides.
            }
            // Signal delivered (or permission denied): confirm via the
            // process table, excluding zombies — an unreaped corpse still
            // answers kill -0 but is not a running daemon.
            match Command::new("ps")
                .args(["-p", &pid_arg, "-o", "state="])
                .output()
            {
                Ok(ps) if ps.status.success() => {
                    let state = String::from_utf8_lossy(&ps.stdout).trim().to_string();
                    !state.starts_with('Z')
                }
                Ok(_) => false,
                Err(_) => true,
            }
        }
        Err(_) => true,
    }
}

#[cfg(windows)]
fn probe_alive(pid: u32) -> bool {
    let filter = format!("PID eq {pid}");
    match Command::new("tasklist").args(["/FI", &filter]).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
        Err(_) => true,
    }
}

#[cfg(unix)]
fn terminate(pid: u32, force: bool) {
    let signal = if force { "-KILL" } else { "-TERM" };
    let _ = Command::new("kill")
        .args([signal, &pid.to_string()])
        .output();
}

#[cfg(windows)]
fn terminate(pid: u32, force: bool) {
    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str()];
    if force {
        args.insert(0, "/F");
    }
    let _ = Command::new("taskkill").args(args).output();
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // New session: the daemon must outlive the spawning terminal.
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
