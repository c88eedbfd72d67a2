//! Synchronous subprocess invocation with a hard timeout.
//!
//! Every external query and control action goes through [`run`]. A command
//! that exceeds its deadline is killed and reported as failed — callers see
//! a boolean outcome plus combined output, never a hang.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one subprocess invocation.
#[derive(Debug, Clone)]
pub(crate) struct Exec {
    pub success: bool,
    /// Stdout if non-empty, otherwise stderr (both trimmed).
    pub output: String,
}

/// Run `program` with `args`, waiting at most `timeout`.
///
/// Spawn failures and timeouts both collapse into `success == false` with a
/// diagnostic in `output`.
pub(crate) fn run(program: &str, args: &[&str], timeout: Duration) -> Exec {
    tracing::debug!(program, ?args, "running command");

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            let message = format!("failed to spawn {program}: {err}");
            tracing::debug!(%message, "command spawn failed");
            return Exec {
                success: false,
                output: message,
            };
        }
    };

    // Drain the pipes on threads so a chatty child cannot deadlock against
    // the deadline loop below.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || read_all(stdout));
    let stderr_reader = std::thread::spawn(move || read_all(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    tracing::error!(program, timeout_secs = timeout.as_secs(), "command timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                tracing::error!(program, error = %err, "failed to wait on command");
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    let Some(status) = status else {
        return Exec {
            success: false,
            output: format!("{program} timed out after {}s", timeout.as_secs()),
        };
    };

    let output = if stdout.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.trim().to_string()
    };

    Exec {
        success: status.success(),
        output,
    }
}

fn read_all(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        let mut bytes = Vec::new();
        if pipe.read_to_end(&mut bytes).is_ok() {
            buf = String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn captures_stdout_of_successful_command() {
        let exec = run("echo", &["hello"], DEFAULT_TIMEOUT);
        assert!(exec.success);
        assert_eq!(exec.output, "hello");
    }

    #[test]
    fn missing_program_is_a_failed_command() {
        let exec = run("planetsync-no-such-binary", &[], DEFAULT_TIMEOUT);
        assert!(!exec.success);
        assert!(exec.output.contains("failed to spawn"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_failure_with_stderr() {
        let exec = run("ls", &["/planetsync-definitely-missing"], DEFAULT_TIMEOUT);
        assert!(!exec.success);
        assert!(!exec.output.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_command_is_killed_and_failed() {
        let exec = run("sleep", &["5"], Duration::from_millis(200));
        assert!(!exec.success);
        assert!(exec.output.contains("timed out"));
    }
}
