//! `planetsync daemon` — foreground runtime and background supervision.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use planetsync_core::{config::MIN_CHECK_INTERVAL, Config};
use planetsync_daemon::{start_blocking, DaemonError, SpawnSpec, Supervisor};

use crate::commands::privileges;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the polling loop in the foreground.
    Run(IntervalArgs),
    /// Spawn the polling loop as a detached background process.
    Start(IntervalArgs),
    /// Terminate the background daemon.
    Stop,
    /// Show background daemon status.
    Status(DaemonStatusArgs),
}

#[derive(Args, Debug)]
pub struct IntervalArgs {
    /// Seconds between checks (overrides configuration).
    #[arg(long, short)]
    pub interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct DaemonStatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Run(args) => {
            let mut config = Config::load().context("failed to load configuration")?;
            if let Some(interval) = args.interval {
                config.check_interval = interval.max(MIN_CHECK_INTERVAL);
            }
            privileges::warn_if_not_elevated();
            start_blocking(config).context("daemon exited with error")?;
        }
        DaemonCommand::Start(args) => {
            let config = Config::load().context("failed to load configuration")?;
            privileges::warn_if_not_elevated();

            let spawn = SpawnSpec::for_daemon_run(args.interval)
                .context("could not determine the daemon command line")?;
            let supervisor = Supervisor::new(config.state_root.clone(), spawn);

            match supervisor.start() {
                Ok(pid) => {
                    println!("{} daemon started (pid {pid})", "✓".green());
                    println!("log file: {}", supervisor.status().log_file.display());
                }
                Err(DaemonError::AlreadyRunning { pid }) => {
                    println!("daemon already running (pid {pid})");
                }
                Err(err) => return Err(err).context("failed to start daemon"),
            }
        }
        DaemonCommand::Stop => {
            let config = Config::load().context("failed to load configuration")?;
            let supervisor = supervisor_for(&config)?;

            if !supervisor.is_running() {
                println!("daemon is not running");
                return Ok(());
            }
            supervisor.stop().context("failed to stop daemon")?;
            println!("{} daemon stopped", "✓".green());
        }
        DaemonCommand::Status(args) => {
            let config = Config::load().context("failed to load configuration")?;
            let status = supervisor_for(&config)?.status();

            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            } else {
                if status.running {
                    println!("status: {} (pid {})", "running".green(), status.pid.unwrap_or(0));
                } else {
                    println!("status: not running");
                }
                println!("pid file: {}", status.pid_file.display());
                println!("log file: {}", status.log_file.display());
                match status.log_size {
                    Some(size) => println!("log size: {size} bytes"),
                    None => println!("log size: (no log yet)"),
                }
            }
        }
    }

    Ok(())
}

fn supervisor_for(config: &Config) -> Result<Supervisor> {
    let spawn = SpawnSpec::for_daemon_run(None)
        .context("could not determine the daemon command line")?;
    Ok(Supervisor::new(config.state_root.clone(), spawn))
}
