//! Planetsync — keep a mesh client's planet file in sync with its
//! rendezvous authority.
//!
//! # Usage
//!
//! ```text
//! planetsync check
//! planetsync force-update
//! planetsync status [--json]
//! planetsync test
//! planetsync daemon run [--interval <secs>]
//! planetsync daemon start|stop|status
//! planetsync init-config [--output <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, init_config::InitConfigArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "planetsync",
    version,
    about = "Keep a mesh client's planet file in sync with its rendezvous authority",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the rendezvous IP list once and update if it changed.
    Check,

    /// Swap in a fresh planet file without checking for changes.
    ForceUpdate,

    /// Show current IPs, service state, and planet file info.
    Status(StatusArgs),

    /// Run the connectivity / permission / service self-test.
    Test,

    /// Manage the background polling daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Write a commented default configuration file.
    InitConfig(InitConfigArgs),
}

fn main() -> Result<()> {
    planetsync_daemon::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check => commands::check::run(),
        Commands::ForceUpdate => commands::update::run(),
        Commands::Status(args) => args.run(),
        Commands::Test => commands::selftest::run(),
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::InitConfig(args) => args.run(),
    }
}
