//! `planetsync check` — one-shot detect-and-update.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use planetsync_core::Config;
use planetsync_sync::{Orchestrator, RunOutcome};

use crate::commands::privileges;

pub fn run() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    privileges::warn_if_not_elevated();

    let orchestrator =
        Orchestrator::new(config).context("failed to initialize the update pipeline")?;

    println!("Checking for rendezvous IP changes...");
    match orchestrator.run_once() {
        RunOutcome::Updated => {
            println!("{} IP change detected — planet file updated", "✓".green());
            Ok(())
        }
        RunOutcome::NoChange => {
            println!("No IP change detected; nothing to do.");
            Ok(())
        }
        RunOutcome::UpdateFailed => {
            bail!("IP change detected but the planet file update failed");
        }
    }
}
