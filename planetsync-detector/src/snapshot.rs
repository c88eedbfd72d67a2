//! Persisted IP snapshot — the last-known-good raw IP list text.
//!
//! Saved verbatim as fetched; writes use a `.tmp` + rename so the snapshot
//! is either the previous content or the new content, never a torn write.

use std::path::Path;

use crate::{io_err, DetectError};

/// Load the snapshot text, if any.
///
/// Read errors are logged and collapse to `None` — a missing or unreadable
/// snapshot must never block a detection cycle.
pub fn load(path: &Path) -> Option<String> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no local IP snapshot yet");
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to read IP snapshot");
            None
        }
    }
}

/// Save snapshot text atomically.
///
/// Writes to `<path>.tmp` then renames over `<path>`.
pub fn save(path: &Path, content: &str) -> Result<(), DetectError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_snapshot_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("ips")).is_none());
    }

    #[test]
    fn roundtrip_preserves_raw_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ips");
        save(&path, "192.168.1.1,\n10.0.0.1\n").unwrap();
        assert_eq!(load(&path).unwrap(), "192.168.1.1,\n10.0.0.1\n");
    }

    #[test]
    fn save_leaves_no_tmp_residue() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ips");
        save(&path, "10.0.0.1").unwrap();
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ips");
        save(&path, "10.0.0.1").unwrap();
        save(&path, "10.0.0.2").unwrap();
        assert_eq!(load(&path).unwrap(), "10.0.0.2");
    }
}
