//! `planetsync init-config` — write a commented default configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use planetsync_core::config::{
    self, DEFAULT_API_KEY, DEFAULT_BASE_URL, DEFAULT_CHECK_INTERVAL, DEFAULT_DOWNLOAD_TIMEOUT,
    DEFAULT_MAX_RETRIES,
};
use planetsync_core::Config;

/// Arguments for `planetsync init-config`.
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Destination path (defaults to `<state root>/config.yaml`).
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl InitConfigArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::load().context("failed to load configuration")?;
        let path = self
            .output
            .unwrap_or_else(|| config::config_file_path(&config.state_root));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }

        std::fs::write(&path, default_config_template())
            .with_context(|| format!("write {}", path.display()))?;
        println!("configuration written: {}", path.display());
        Ok(())
    }
}

fn default_config_template() -> String {
    format!(
        r#"# planetsync configuration
#
# Rendezvous authority
api_key: "{DEFAULT_API_KEY}"
base_url: "{DEFAULT_BASE_URL}"

# Monitoring
check_interval: {DEFAULT_CHECK_INTERVAL}    # seconds between daemon checks
download_timeout: {DEFAULT_DOWNLOAD_TIMEOUT}    # per-request HTTP timeout (seconds)
max_retries: {DEFAULT_MAX_RETRIES}          # retries after the first failed attempt

# Override the mesh client installation directory (optional)
# install_dir: "/Library/Application Support/ZeroTier/One"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_is_loadable_yaml() {
        let parsed: Config = serde_yaml::from_str(&default_config_template()).expect("parse");
        assert_eq!(parsed.base_url, DEFAULT_BASE_URL);
        assert_eq!(parsed.check_interval, DEFAULT_CHECK_INTERVAL);
    }
}
