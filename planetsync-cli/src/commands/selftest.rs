//! `planetsync test` — connectivity, permission, and service self-test.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use planetsync_core::{Config, IpSet};
use planetsync_detector::IpMonitor;
use planetsync_service::Controller;
use planetsync_sync::directory_writable;

pub fn run() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let mut failures = 0usize;

    println!("Running system self-test...");

    // 1. Authority reachability.
    println!("1. Network connectivity");
    let monitor = IpMonitor::new(&config);
    match monitor.fetch_remote() {
        Ok(text) => {
            let count = IpSet::parse(&text).len();
            println!("   {} authority reachable, {count} address(es) published", "✓".green());
        }
        Err(err) => {
            println!("   {} {err}", "✗".red());
            failures += 1;
        }
    }

    // 2. Write permission on the installation directory.
    println!("2. File permissions");
    match config.install_dir() {
        Ok(dir) if directory_writable(&dir) => {
            println!("   {} {} is writable", "✓".green(), dir.display());
        }
        Ok(dir) => {
            println!(
                "   {} no write permission on {} (run elevated)",
                "✗".red(),
                dir.display()
            );
            failures += 1;
        }
        Err(err) => {
            println!("   {} {err}", "✗".red());
            failures += 1;
        }
    }

    // 3 + 4. Service status and peer listing.
    match Controller::for_current_platform() {
        Ok(controller) => {
            println!("3. Mesh service");
            if controller.check_status() {
                println!("   {} background service is running", "✓".green());
            } else {
                println!("   {} background service is not running", "✗".red());
                failures += 1;
            }

            println!("4. Peer verification");
            if controller.verify_peers() {
                println!("   {} root-server role visible in peer list", "✓".green());
            } else {
                println!("   {} root-server role not visible", "✗".red());
                failures += 1;
            }
        }
        Err(err) => {
            println!("3. Mesh service");
            println!("   {} {err}", "✗".red());
            println!("4. Peer verification");
            println!("   {} skipped", "✗".red());
            failures += 2;
        }
    }

    if failures > 0 {
        bail!("self-test failed: {failures} check(s) did not pass");
    }
    println!("All checks passed.");
    Ok(())
}
