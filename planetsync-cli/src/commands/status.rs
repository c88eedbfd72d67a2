//! `planetsync status` — current IPs, service state, planet file info.
//!
//! Degrades gracefully: an unsupported platform or unreachable authority
//! shows up as `unknown` / empty fields, never as a hard failure.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use planetsync_core::{Config, ServiceState};
use planetsync_detector::IpMonitor;
use planetsync_service::Controller;

/// Arguments for `planetsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::load().context("failed to load configuration")?;
        let report = build_report(&config);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render status JSON")?
            );
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    current_ips: Vec<String>,
    service: ServiceReport,
    planet_file: PlanetReport,
    config: ConfigReport,
}

#[derive(Debug, Serialize)]
struct ServiceReport {
    state: ServiceState,
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlanetReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    base_url: String,
    check_interval: u64,
    state_root: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn build_report(config: &Config) -> StatusReport {
    let monitor = IpMonitor::new(config);
    let current_ips: Vec<String> = monitor.current_ips().iter().map(str::to_string).collect();

    let service = match Controller::for_current_platform() {
        Ok(controller) => {
            let state = controller.state();
            ServiceReport {
                state,
                running: state == ServiceState::Running,
                note: None,
            }
        }
        Err(err) => ServiceReport {
            state: ServiceState::Unknown,
            running: false,
            note: Some(err.to_string()),
        },
    };

    let planet_file = match config.planet_path() {
        Ok(path) => planet_report(&path),
        Err(err) => PlanetReport {
            path: None,
            exists: false,
            size: None,
            modified: Some(err.to_string()),
        },
    };

    StatusReport {
        current_ips,
        service,
        planet_file,
        config: ConfigReport {
            base_url: config.base_url.clone(),
            check_interval: config.check_interval,
            state_root: config.state_root.display().to_string(),
        },
    }
}

fn planet_report(path: &Path) -> PlanetReport {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => {
            return PlanetReport {
                path: Some(path.display().to_string()),
                exists: false,
                size: None,
                modified: None,
            }
        }
    };

    let modified = meta
        .modified()
        .ok()
        .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string());

    PlanetReport {
        path: Some(path.display().to_string()),
        exists: true,
        size: Some(meta.len()),
        modified,
    }
}

fn print_table(report: &StatusReport) {
    let ips = if report.current_ips.is_empty() {
        "(none)".to_string()
    } else {
        report.current_ips.join(", ")
    };

    let service = match report.service.state {
        ServiceState::Running => "running".green().to_string(),
        ServiceState::Unknown => match &report.service.note {
            Some(note) => format!("{} ({note})", "unknown".yellow()),
            None => "unknown".yellow().to_string(),
        },
        other => other.to_string().red().to_string(),
    };

    let planet = if report.planet_file.exists {
        format!(
            "{} ({} bytes, modified {})",
            report.planet_file.path.as_deref().unwrap_or("planet"),
            report.planet_file.size.unwrap_or(0),
            report.planet_file.modified.as_deref().unwrap_or("unknown"),
        )
    } else {
        "missing".to_string()
    };

    let rows = vec![
        StatusRow {
            field: "rendezvous IPs",
            value: ips,
        },
        StatusRow {
            field: "mesh service",
            value: service,
        },
        StatusRow {
            field: "planet file",
            value: planet,
        },
        StatusRow {
            field: "authority",
            value: report.config.base_url.clone(),
        },
        StatusRow {
            field: "check interval",
            value: format!("{}s", report.config.check_interval),
        },
        StatusRow {
            field: "state root",
            value: report.config.state_root.clone(),
        },
    ];

    println!("{}", Table::new(rows).with(Style::rounded()));
}
