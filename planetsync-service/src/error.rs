//! Error types for planetsync-service.

use thiserror::Error;

use planetsync_core::PlatformNotSupported;

/// All errors that can arise from service control.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Platform(#[from] PlatformNotSupported),

    /// The background service never reached the running state.
    #[error("mesh service failed to start")]
    StartFailed,

    /// Forceful termination errored and the processes remain discoverable.
    #[error("mesh service failed to stop; surviving pid(s): {pids:?}")]
    StopFailed { pids: Vec<u32> },
}
