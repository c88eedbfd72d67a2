//! Platform service control for the mesh client.
//!
//! The sequencing logic lives in [`Controller`] and is platform-agnostic;
//! everything OS-specific sits behind the [`PlatformOps`] capability trait,
//! selected once at startup via [`platform::ops_for_current_platform`].

mod command;
mod controller;
mod error;
mod macos;
pub mod platform;
mod windows;

pub use controller::{Controller, Timings};
pub use error::ServiceError;
pub use platform::{ops_for_current_platform, PlatformOps, SignalOutcome, PLANET_ROLE_MARKER};
