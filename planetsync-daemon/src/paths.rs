use std::path::{Path, PathBuf};

pub const DAEMON_LOG: &str = "daemon.log";
pub const DAEMON_PID_FILE: &str = "daemon.pid";

pub fn run_dir(root: &Path) -> PathBuf {
    root.join("run")
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

pub fn pid_path(root: &Path) -> PathBuf {
    run_dir(root).join(DAEMON_PID_FILE)
}

pub fn log_path(root: &Path) -> PathBuf {
    logs_dir(root).join(DAEMON_LOG)
}

/// Create the run and log directories if missing.
pub fn ensure_runtime_dirs(root: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(run_dir(root))?;
    std::fs::create_dir_all(logs_dir(root))?;
    Ok(())
}
