//! Error types for planetsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// The running OS is not one the mesh client ships on.
#[derive(Debug, Clone, Error)]
#[error("unsupported platform: {os}")]
pub struct PlatformNotSupported {
    pub os: String,
}

/// All errors that can arise from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Transport exhausted its retries, or produced an unusable body.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request for {url} failed after {attempts} attempt(s): {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn download_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.into(),
        source,
    }
}
