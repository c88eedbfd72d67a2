//! Runtime configuration.
//!
//! Precedence, lowest to highest: built-in defaults → `<root>/config.yaml`
//! (optional) → `PLANETSYNC_*` environment variables. The state root itself
//! comes from `PLANETSYNC_ROOT` or defaults to `~/.planetsync`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PlatformNotSupported};
use crate::types::Platform;

pub const DEFAULT_BASE_URL: &str = "http://songmd.yicp.fun:13000";
pub const DEFAULT_API_KEY: &str = "54fbe2f7a1d2902d";
pub const DEFAULT_CHECK_INTERVAL: u64 = 300;
pub const DEFAULT_DOWNLOAD_TIMEOUT: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Floor for the daemon polling interval. Backup filenames embed a
/// second-granularity timestamp, so replacement frequency must stay well
/// below once per second.
pub const MIN_CHECK_INTERVAL: u64 = 5;

pub const ENV_ROOT: &str = "PLANETSYNC_ROOT";
pub const ENV_API_KEY: &str = "PLANETSYNC_API_KEY";
pub const ENV_BASE_URL: &str = "PLANETSYNC_BASE_URL";
pub const ENV_CHECK_INTERVAL: &str = "PLANETSYNC_CHECK_INTERVAL";
pub const ENV_DOWNLOAD_TIMEOUT: &str = "PLANETSYNC_DOWNLOAD_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "PLANETSYNC_MAX_RETRIES";
pub const ENV_INSTALL_DIR: &str = "PLANETSYNC_INSTALL_DIR";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key appended to the authority URLs as a query parameter.
    pub api_key: String,
    /// Base URL of the rendezvous authority.
    pub base_url: String,
    /// Daemon polling interval in seconds.
    pub check_interval: u64,
    /// Per-request HTTP timeout in seconds.
    pub download_timeout: u64,
    /// Retries after the first failed HTTP attempt.
    pub max_retries: u32,
    /// State root holding the cache, logs, run dir, and IP snapshot.
    pub state_root: PathBuf,
    /// Override for the mesh client installation directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            state_root: default_root(),
            install_dir: None,
        }
    }
}

impl Config {
    /// Load configuration for the current process.
    pub fn load() -> Result<Config, ConfigError> {
        let root = std::env::var_os(ENV_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(default_root);
        Self::load_from_root(root)
    }

    /// Load configuration rooted at an explicit state directory.
    pub fn load_from_root(root: PathBuf) -> Result<Config, ConfigError> {
        let file = config_file_path(&root);
        let mut config = if file.exists() {
            let contents = std::fs::read_to_string(&file).map_err(|e| ConfigError::Io {
                path: file.clone(),
                source: e,
            })?;
            serde_yaml::from_str::<Config>(&contents).map_err(|e| ConfigError::Parse {
                path: file.clone(),
                source: e,
            })?
        } else {
            Config::default()
        };

        config.state_root = root;
        config.apply_env();

        if config.check_interval < MIN_CHECK_INTERVAL {
            tracing::warn!(
                requested = config.check_interval,
                floor = MIN_CHECK_INTERVAL,
                "check interval below floor; clamping",
            );
            config.check_interval = MIN_CHECK_INTERVAL;
        }

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(interval) = env_u64(ENV_CHECK_INTERVAL) {
            self.check_interval = interval;
        }
        if let Some(timeout) = env_u64(ENV_DOWNLOAD_TIMEOUT) {
            self.download_timeout = timeout;
        }
        if let Some(retries) = env_u64(ENV_MAX_RETRIES) {
            self.max_retries = retries as u32;
        }
        if let Some(dir) = std::env::var_os(ENV_INSTALL_DIR) {
            self.install_dir = Some(PathBuf::from(dir));
        }
    }

    /// URL of the planet file endpoint.
    pub fn planet_url(&self) -> String {
        format!("{}/planet?key={}", self.base_url, self.api_key)
    }

    /// URL of the rendezvous IP list endpoint.
    pub fn ips_url(&self) -> String {
        format!("{}/ips?key={}", self.base_url, self.api_key)
    }

    /// Installation directory of the mesh client (override or platform
    /// default).
    pub fn install_dir(&self) -> Result<PathBuf, PlatformNotSupported> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        Ok(Platform::current()?.default_install_dir())
    }

    /// Path of the live planet file inside the installation directory.
    pub fn planet_path(&self) -> Result<PathBuf, PlatformNotSupported> {
        Ok(self.install_dir()?.join("planet"))
    }

    /// Staging directory for downloads.
    pub fn cache_dir(&self) -> PathBuf {
        self.state_root.join("cache")
    }

    /// Staging location of a freshly downloaded planet file.
    pub fn staged_planet_path(&self) -> PathBuf {
        self.cache_dir().join("planet")
    }

    /// Path of the persisted IP snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.state_root.join("ips")
    }
}

/// `<root>/config.yaml`
pub fn config_file_path(root: &Path) -> PathBuf {
    root.join("config.yaml")
}

/// `~/.planetsync`, or `./.planetsync` when no home directory is known.
pub fn default_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".planetsync")
}

fn env_u64(var: &str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring non-numeric environment override");
            None
        }
    }
}
