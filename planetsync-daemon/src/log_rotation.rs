//! Size-based rotation for the daemon log.
//!
//! The detached daemon appends stdout and stderr to a single
//! `<root>/logs/daemon.log`. When it grows past the threshold it is
//! renamed to `daemon.log.1` (shifting older copies up) and a fresh empty
//! file takes its place, so the redirected file descriptors always have a
//! writable target. At most [`MAX_ROTATED_FILES`] numbered copies survive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths;

/// Rotation threshold (8 MiB).
pub const MAX_LOG_BYTES: u64 = 8 * 1024 * 1024;

/// Numbered copies retained after rotation.
pub const MAX_ROTATED_FILES: usize = 4;

/// Rotate `log_path` if it has grown past `max_bytes`.
///
/// Returns `true` if a rotation happened. A missing log file is a no-op,
/// not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered(log_path, n + 1))?;
        }
    }

    fs::rename(log_path, numbered(log_path, 1))?;

    // Recreate the live file so appenders keep a valid path.
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate the daemon log under `root`; errors are logged, never fatal.
pub fn rotate_daemon_log(root: &Path) {
    let log = paths::log_path(root);
    match rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(true) => tracing::info!(path = %log.display(), "daemon log rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log.display(), error = %err, "log rotation failed"),
    }
}

fn numbered(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(paths::DAEMON_LOG);
    base.with_file_name(format!("{name}.{n}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
