//! Error types for planetsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use planetsync_core::{DownloadError, PlatformNotSupported};
use planetsync_detector::DetectError;
use planetsync_service::ServiceError;

/// All errors that can arise from replacement and reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Platform(#[from] PlatformNotSupported),

    /// The target directory refused a write probe.
    #[error("no write permission on {dir} (run elevated)")]
    Permission { dir: PathBuf },

    /// The staged candidate file is missing.
    #[error("candidate planet file missing: {path}")]
    MissingCandidate { path: PathBuf },

    /// The downloaded candidate failed the size/non-emptiness check.
    #[error("integrity check failed for {path}")]
    Integrity { path: PathBuf },

    /// Install failed mid-protocol; the previous file was restored.
    #[error("replace failed at {path}: {source} (previous planet file restored)")]
    ReplaceRolledBack {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("detector error: {0}")]
    Detect(#[from] DetectError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
