//! Error types for planetsync-daemon.

use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the supervisor protocol and the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("daemon already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("daemon failed to start: {0}")]
    SpawnFailed(String),

    #[error("daemon process {pid} is still alive after forceful termination")]
    StopFailed { pid: u32 },

    #[error("sync error: {0}")]
    Sync(#[from] planetsync_sync::SyncError),

    #[error("daemon runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
