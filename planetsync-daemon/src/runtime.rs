//! The foreground daemon runtime.
//!
//! One reconciliation cycle per interval, executed on the blocking pool.
//! Between cycles the loop sleeps in one-second ticks racing a shutdown
//! broadcast, so ctrl-c or SIGTERM is honored within about a second even
//! for long intervals. A cycle that panics is logged and the loop backs
//! off for a minute; the daemon exits only on the stop signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use planetsync_core::Config;
use planetsync_sync::{Orchestrator, RunOutcome};

use crate::error::{io_err, DaemonError};
use crate::log_rotation;
use crate::paths;

/// Backoff after a cycle panic or executor failure.
const FAILURE_BACKOFF_SECS: u64 = 60;

/// Period of the log-rotation check.
const ROTATION_PERIOD: Duration = Duration::from_secs(60);

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon runtime.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    paths::ensure_runtime_dirs(&config.state_root).map_err(|e| io_err(&config.state_root, e))?;

    let interval = config.check_interval;
    let root = config.state_root.clone();
    let orchestrator = Arc::new(Orchestrator::new(config)?);

    tracing::info!(interval_secs = interval, "daemon runtime starting");

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = wait_for_stop_signal() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("stop signal received; shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Runtime(format!(
                            "signal handler failed: {err}"
                        ))),
                    }
                }
            }
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            let mut ticker = tokio::time::interval(ROTATION_PERIOD);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // consume the immediate first tick
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let root = root.clone();
                        let _ = tokio::task::spawn_blocking(move || {
                            log_rotation::rotate_daemon_log(&root);
                        })
                        .await;
                    }
                }
            }
            Ok::<(), DaemonError>(())
        })
    };

    let cycle_handle = {
        let shutdown = shutdown_tx.clone();
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            loop {
                let orch = orchestrator.clone();
                let cycle = tokio::task::spawn_blocking(move || orch.run_once()).await;

                let sleep_secs = match cycle {
                    Ok(outcome) => {
                        log_outcome(outcome);
                        interval
                    }
                    Err(err) => {
                        // A panicked cycle must not kill the daemon.
                        tracing::error!(error = %err, "reconciliation cycle crashed; backing off");
                        FAILURE_BACKOFF_SECS
                    }
                };

                if sleep_ticks(sleep_secs, &mut shutdown_rx).await {
                    break;
                }
            }
            let _ = shutdown.send(());
            Ok::<(), DaemonError>(())
        })
    };

    let (signal_result, rotation_result, cycle_result) =
        tokio::join!(signal_handle, rotation_handle, cycle_handle);

    handle_join("signal_handler", signal_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("cycle_loop", cycle_result)?;

    tracing::info!("daemon runtime stopped");
    Ok(())
}

fn log_outcome(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Updated => tracing::info!("cycle complete: planet file updated"),
        RunOutcome::NoChange => tracing::debug!("cycle complete: no change"),
        RunOutcome::UpdateFailed => tracing::error!("cycle complete: update failed"),
    }
}

/// Sleep `secs` seconds in one-second ticks, returning `true` as soon as a
/// shutdown message arrives.
async fn sleep_ticks(secs: u64, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    for _ in 0..secs {
        tokio::select! {
            _ = shutdown_rx.recv() => return true,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
    false
}

#[cfg(unix)]
async fn wait_for_stop_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the process-wide tracing subscriber (idempotent).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn sleep_ticks_runs_full_interval_without_shutdown() {
        let (tx, mut rx) = broadcast::channel::<()>(1);
        let before = tokio::time::Instant::now();
        let interrupted = sleep_ticks(30, &mut rx).await;
        assert!(!interrupted);
        assert_eq!((tokio::time::Instant::now() - before).as_secs(), 30);
        drop(tx);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn sleep_ticks_honors_shutdown_within_a_tick() {
        let (tx, mut rx) = broadcast::channel::<()>(1);
        tx.send(()).expect("send shutdown");

        let before = tokio::time::Instant::now();
        let interrupted = sleep_ticks(600, &mut rx).await;
        assert!(interrupted);
        assert!(
            (tokio::time::Instant::now() - before).as_secs() <= 1,
            "shutdown must be honored within one tick"
        );
    }
}
