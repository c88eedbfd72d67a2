//! Planetsync core library — domain types, configuration, HTTP transport.
//!
//! Public API surface:
//! - [`types`] — [`IpSet`], [`Platform`], [`ServiceState`]
//! - [`config`] — [`Config`] (defaults → YAML file → environment)
//! - [`transport`] — retried byte/text fetches with exponential backoff
//! - [`error`] — [`ConfigError`], [`DownloadError`], [`PlatformNotSupported`]

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, DownloadError, PlatformNotSupported};
pub use transport::Transport;
pub use types::{IpSet, Platform, ServiceState};
