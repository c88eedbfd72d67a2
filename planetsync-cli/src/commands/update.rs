//! `planetsync force-update` — swap without detection.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use planetsync_core::Config;
use planetsync_sync::Orchestrator;

use crate::commands::privileges;

pub fn run() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    privileges::warn_if_not_elevated();

    let orchestrator =
        Orchestrator::new(config).context("failed to initialize the update pipeline")?;

    println!("Forcing planet file update...");
    if orchestrator.force_update() {
        println!("{} planet file updated", "✓".green());
        Ok(())
    } else {
        bail!("planet file update failed");
    }
}
