//! # planetsync-sync
//!
//! Backup-guarded planet-file replacement and the reconciliation
//! orchestrator that sequences detect → replace → restart → verify.
//!
//! Call [`Orchestrator::run_once`] for one detect-and-update cycle, or
//! [`Orchestrator::force_update`] to swap unconditionally.

pub mod error;
pub mod orchestrator;
pub mod replacer;
pub mod steps;

pub use error::SyncError;
pub use orchestrator::{Orchestrator, OrchestratorTimings, RunOutcome};
pub use replacer::{directory_writable, verify_integrity, Replacer};
pub use steps::{drive, Step, StepOutcome, StepPolicy, UpdateReport};
