//! Daemon supervision and the foreground polling runtime.
//!
//! [`Supervisor`] manages a detached background process through a PID-file
//! liveness protocol; [`runtime`] is what that process actually runs — one
//! reconciliation per interval, with cooperative shutdown at one-second
//! granularity.

mod error;
pub mod log_rotation;
pub mod paths;
mod runtime;
mod supervisor;

pub use error::DaemonError;
pub use runtime::{init_tracing, start_blocking};
pub use supervisor::{SpawnSpec, Supervisor, SupervisorStatus};
