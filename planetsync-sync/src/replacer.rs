//! Backup-guarded planet-file replacement.
//!
//! ## `replace` — protocol
//!
//! 1. Preconditions, in order: supported platform, writable target
//!    directory, candidate present. Each failure is a distinct error.
//! 2. Back up the current file (timestamped sibling), if one exists.
//! 3. Ensure the parent directory exists.
//! 4. Copy the candidate over the target.
//! 5. Apply platform file permissions (world-readable on Unix-likes).
//! 6. On any failure in 3–5, restore the backup over the target before
//!    returning the error — the target ends the operation either fully
//!    updated or exactly as it was, never partial or missing.

use std::path::{Path, PathBuf};

use chrono::Local;

use planetsync_core::Platform;

use crate::error::{io_err, SyncError};

/// Default number of timestamped backups retained beside the target.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

const BACKUP_INFIX: &str = ".backup_";

/// Replaces the live planet file, keeping timestamped backups.
pub struct Replacer {
    platform: Platform,
    target: PathBuf,
    max_backups: usize,
}

impl Replacer {
    pub fn new(platform: Platform, target: PathBuf) -> Self {
        Self {
            platform,
            target,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Install `candidate` over the target path.
    ///
    /// Returns the backup path when a previous file existed.
    pub fn replace(&self, candidate: &Path) -> Result<Option<PathBuf>, SyncError> {
        self.replace_with(candidate, &|from, to| std::fs::copy(from, to))
    }

    /// Same protocol with an injectable copy primitive.
    pub(crate) fn replace_with(
        &self,
        candidate: &Path,
        copy: &dyn Fn(&Path, &Path) -> std::io::Result<u64>,
    ) -> Result<Option<PathBuf>, SyncError> {
        let target_dir = self
            .target
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        if target_dir.exists() && !directory_writable(&target_dir) {
            return Err(SyncError::Permission { dir: target_dir });
        }
        if !candidate.exists() {
            return Err(SyncError::MissingCandidate {
                path: candidate.to_path_buf(),
            });
        }

        let backup = if self.target.exists() {
            Some(self.create_backup()?)
        } else {
            tracing::info!(target = %self.target.display(), "no existing file to back up");
            None
        };

        let install = (|| -> std::io::Result<()> {
            std::fs::create_dir_all(&target_dir)?;
            copy(candidate, &self.target)?;
            self.apply_permissions()?;
            Ok(())
        })();

        if let Err(err) = install {
            if let Some(backup) = &backup {
                match std::fs::copy(backup, &self.target) {
                    Ok(_) => tracing::info!(
                        backup = %backup.display(),
                        "previous planet file restored after failed replace",
                    ),
                    Err(restore_err) => tracing::error!(
                        backup = %backup.display(),
                        error = %restore_err,
                        "restore from backup failed",
                    ),
                }
            }
            return Err(SyncError::ReplaceRolledBack {
                path: self.target.clone(),
                source: err,
            });
        }

        tracing::info!(
            candidate = %candidate.display(),
            target = %self.target.display(),
            "planet file replaced",
        );
        Ok(backup)
    }

    fn create_backup(&self) -> Result<PathBuf, SyncError> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let name = self.target_file_name();
        let backup = self
            .target
            .with_file_name(format!("{name}{BACKUP_INFIX}{timestamp}"));

        std::fs::copy(&self.target, &backup).map_err(|e| io_err(&backup, e))?;
        tracing::info!(backup = %backup.display(), "backed up current planet file");
        Ok(backup)
    }

    /// Delete all but the newest `max_backups` backups, by modification
    /// time. Best-effort: individual failures are logged and skipped.
    pub fn cleanup_old_backups(&self) -> usize {
        let Some(dir) = self.target.parent() else {
            return 0;
        };
        let prefix = format!("{}{}", self.target_file_name(), BACKUP_INFIX);

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(dir = %dir.display(), error = %err, "backup scan failed");
                return 0;
            }
        };

        let mut backups: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&prefix) {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            backups.push((entry.path(), modified));
        }

        if backups.len() <= self.max_backups {
            return 0;
        }

        // Newest first; everything beyond the retention count goes.
        backups.sort_by(|a, b| b.1.cmp(&a.1));

        let mut removed = 0;
        for (path, _) in backups.into_iter().skip(self.max_backups) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(backup = %path.display(), "pruned old backup");
                    removed += 1;
                }
                Err(err) => {
                    tracing::warn!(backup = %path.display(), error = %err, "failed to prune backup");
                }
            }
        }
        removed
    }

    fn target_file_name(&self) -> String {
        self.target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "planet".to_string())
    }

    #[cfg(unix)]
    fn apply_permissions(&self) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        if self.platform == Platform::MacOs {
            std::fs::set_permissions(&self.target, std::fs::Permissions::from_mode(0o644))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn apply_permissions(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Probe whether `dir` accepts file creation.
pub fn directory_writable(dir: &Path) -> bool {
    let probe = dir.join(".planetsync-write-probe");
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
    {
        Ok(file) => {
            drop(file);
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Reject missing or zero-length files and, when given, mismatched sizes.
pub fn verify_integrity(path: &Path, expected_size: Option<u64>) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "integrity check: missing file");
            return false;
        }
    };

    let size = meta.len();
    if size == 0 {
        tracing::error!(path = %path.display(), "integrity check: empty file");
        return false;
    }
    if let Some(expected) = expected_size {
        if size != expected {
            tracing::warn!(
                path = %path.display(),
                expected,
                actual = size,
                "integrity check: size mismatch",
            );
            return false;
        }
    }

    tracing::debug!(path = %path.display(), size, "integrity check passed");
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn replacer(target: &Path) -> Replacer {
        Replacer::new(Platform::MacOs, target.to_path_buf())
    }

    fn write_backup(dir: &Path, suffix: &str, mtime_secs: i64) -> PathBuf {
        let path = dir.join(format!("planet.backup_{suffix}"));
        fs::write(&path, suffix).unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(mtime_secs, 0))
            .unwrap();
        path
    }

    #[test]
    fn first_replace_installs_without_backup() {
        let dir = TempDir::new().unwrap();
        let candidate = dir.path().join("staged");
        fs::write(&candidate, "v1").unwrap();
        let target = dir.path().join("install").join("planet");

        let backup = replacer(&target).replace(&candidate).expect("replace");
        assert!(backup.is_none());
        assert_eq!(fs::read_to_string(&target).unwrap(), "v1");
    }

    #[test]
    fn replace_backs_up_previous_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("planet");
        fs::write(&target, "old").unwrap();
        let candidate = dir.path().join("staged");
        fs::write(&candidate, "new").unwrap();

        let backup = replacer(&target)
            .replace(&candidate)
            .expect("replace")
            .expect("backup path");
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old");
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("planet.backup_"), "got {name}");
    }

    #[test]
    fn missing_candidate_is_a_distinct_error() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("planet");
        let err = replacer(&target)
            .replace(&dir.path().join("nope"))
            .expect_err("missing candidate");
        assert!(matches!(err, SyncError::MissingCandidate { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn readonly_target_dir_is_a_permission_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let install = dir.path().join("install");
        fs::create_dir_all(&install).unwrap();
        let candidate = dir.path().join("staged");
        fs::write(&candidate, "new").unwrap();

        let mut perms = fs::metadata(&install).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&install, perms).unwrap();

        let err = replacer(&install.join("planet"))
            .replace(&candidate)
            .expect_err("readonly dir");
        assert!(matches!(err, SyncError::Permission { .. }));

        let mut perms = fs::metadata(&install).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&install, perms).unwrap();
    }

    #[test]
    fn failed_install_restores_previous_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("planet");
        fs::write(&target, "previous").unwrap();
        let candidate = dir.path().join("staged");
        fs::write(&candidate, "next").unwrap();

        // Copy primitive fails after the backup has been taken.
        let failing = |_: &Path, _: &Path| -> std::io::Result<u64> {
            Err(std::io::Error::other("disk full"))
        };
        let err = replacer(&target)
            .replace_with(&candidate, &failing)
            .expect_err("injected failure");
        assert!(matches!(err, SyncError::ReplaceRolledBack { .. }));

        // All-or-nothing: the target must hold its pre-operation content.
        assert_eq!(fs::read_to_string(&target).unwrap(), "previous");
    }

    #[cfg(unix)]
    #[test]
    fn replace_sets_world_readable_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let candidate = dir.path().join("staged");
        fs::write(&candidate, "v1").unwrap();
        let target = dir.path().join("planet");

        replacer(&target).replace(&candidate).expect("replace");
        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn verify_integrity_rules() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        fs::write(&empty, "").unwrap();
        fs::write(&full, "12345").unwrap();

        assert!(!verify_integrity(&missing, None));
        assert!(!verify_integrity(&empty, None));
        assert!(verify_integrity(&full, None));
        assert!(verify_integrity(&full, Some(5)));
        assert!(!verify_integrity(&full, Some(6)));
    }

    #[test]
    fn cleanup_keeps_newest_five_by_mtime() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("planet");
        fs::write(&target, "live").unwrap();

        // Eight backups with distinct mtimes, created out of order.
        for (i, secs) in [5, 1, 7, 3, 8, 2, 6, 4].iter().enumerate() {
            write_backup(dir.path(), &format!("2024010{}_000000", i), 1_700_000_000 + secs);
        }

        let removed = replacer(&target).cleanup_old_backups();
        assert_eq!(removed, 3);

        let mut remaining: Vec<(PathBuf, std::time::SystemTime)> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("planet.backup_"))
            .map(|e| (e.path(), e.metadata().unwrap().modified().unwrap()))
            .collect();
        assert_eq!(remaining.len(), 5);

        // The five newest mtimes (4..=8) survive.
        remaining.sort_by(|a, b| a.1.cmp(&b.1));
        let oldest = remaining.first().unwrap().1;
        let floor = filetime::FileTime::from_unix_time(1_700_000_004, 0);
        assert!(filetime::FileTime::from_system_time(oldest) >= floor);
    }

    #[test]
    fn cleanup_is_a_noop_under_retention_count() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("planet");
        for i in 0..3 {
            write_backup(dir.path(), &format!("2024010{}_000000", i), 1_700_000_000 + i as i64);
        }
        assert_eq!(replacer(&target).cleanup_old_backups(), 0);
    }

    #[test]
    fn cleanup_ignores_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("planet");
        fs::write(dir.path().join("planet"), "live").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        for i in 0..7 {
            write_backup(dir.path(), &format!("2024010{}_000000", i), 1_700_000_000 + i as i64);
        }

        replacer(&target).cleanup_old_backups();
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("planet").exists());
    }

    #[test]
    fn directory_writable_probe() {
        let dir = TempDir::new().unwrap();
        assert!(directory_writable(dir.path()));
        assert!(!dir.path().join(".planetsync-write-probe").exists());
    }
}
