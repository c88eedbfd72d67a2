//! Elevation check. Replacing the planet file and bouncing the service
//! need administrator rights; we warn up front but let the attempt run,
//! since the permission probe on the target directory is authoritative.

use std::process::Command;

/// Print a warning when the process does not look elevated.
pub fn warn_if_not_elevated() {
    if !is_elevated() {
        eprintln!(
            "warning: not running with administrator privileges; \
             replacing the planet file will likely fail"
        );
    }
}

#[cfg(unix)]
fn is_elevated() -> bool {
    match Command::new("id").arg("-u").output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim() == "0",
        // Cannot tell; stay quiet rather than nag.
        Err(_) => true,
    }
}

#[cfg(windows)]
fn is_elevated() -> bool {
    // `net session` succeeds only in an elevated shell.
    match Command::new("net").arg("session").output() {
        Ok(output) => output.status.success(),
        Err(_) => true,
    }
}
