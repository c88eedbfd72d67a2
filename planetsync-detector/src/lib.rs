//! IP change detection for planetsync.
//!
//! [`IpMonitor::detect`] fetches the authority's published rendezvous IP
//! list, compares it as a *set* against the persisted local snapshot, and
//! reports whether an update is warranted. A fetch failure is never allowed
//! to look like a change — detection degrades to `Unchanged`.

pub mod snapshot;

use std::path::PathBuf;

use thiserror::Error;

use planetsync_core::{Config, DownloadError, IpSet, Transport};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of one detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The remote set differs from the snapshot. `content` is the raw
    /// remote text, verbatim, so the caller can persist exactly what was
    /// fetched.
    Changed { content: String },
    /// Sets are equal, or the remote list could not be fetched.
    Unchanged,
}

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download error: {0}")]
    Download(#[from] DownloadError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DetectError {
    DetectError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// IpMonitor
// ---------------------------------------------------------------------------

/// Watches the authority's IP list for changes against a local snapshot.
pub struct IpMonitor {
    transport: Transport,
    ips_url: String,
    snapshot_path: PathBuf,
}

impl IpMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            transport: Transport::from_config(config),
            ips_url: config.ips_url(),
            snapshot_path: config.snapshot_path(),
        }
    }

    /// Fetch the raw remote IP list text.
    pub fn fetch_remote(&self) -> Result<String, DownloadError> {
        self.transport.fetch_text(&self.ips_url)
    }

    /// One detection cycle: fetch, parse both sides, compare as sets.
    ///
    /// A fetch failure is logged and reported as [`Detection::Unchanged`].
    pub fn detect(&self) -> Detection {
        let remote_text = match self.fetch_remote() {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "IP list fetch failed; treating as unchanged");
                return Detection::Unchanged;
            }
        };

        let remote = IpSet::parse(&remote_text);
        let local = self.local_ips();

        if remote == local {
            tracing::debug!("IP list unchanged");
            return Detection::Unchanged;
        }

        let added = remote.difference(&local);
        let removed = local.difference(&remote);
        tracing::info!(
            local = %local,
            remote = %remote,
            added = ?added,
            removed = ?removed,
            "rendezvous IP set changed",
        );

        Detection::Changed {
            content: remote_text,
        }
    }

    /// Current IP set: the snapshot if present, otherwise a live fetch.
    ///
    /// Never errors — any failure yields an empty set.
    pub fn current_ips(&self) -> IpSet {
        let local = self.local_ips();
        if !local.is_empty() {
            return local;
        }

        match self.fetch_remote() {
            Ok(text) => IpSet::parse(&text),
            Err(err) => {
                tracing::error!(error = %err, "could not determine current IP set");
                IpSet::default()
            }
        }
    }

    /// Persist raw remote text as the new snapshot (atomic write).
    pub fn record_snapshot(&self, content: &str) -> Result<(), DetectError> {
        snapshot::save(&self.snapshot_path, content)?;
        tracing::info!(path = %self.snapshot_path.display(), "IP snapshot updated");
        Ok(())
    }

    fn local_ips(&self) -> IpSet {
        match snapshot::load(&self.snapshot_path) {
            Some(text) => IpSet::parse(&text),
            None => IpSet::default(),
        }
    }
}
