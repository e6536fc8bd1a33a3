//! Runtime configuration: defaults, then the optional TOML file, then
//! environment variables and command-line flags.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tui::workflow_list::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_LIVE_PATH: &str = "live/";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
const APP_DIR: &str = "tower-tui";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub page_size: Option<u32>,
    pub live_path: Option<String>,
    pub theme: Option<String>,
    pub refresh_interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(target: "config", path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub page_size: Option<u32>,
    pub live_path: Option<String>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TowerConfig {
    pub api_url: String,
    pub access_token: Option<String>,
    pub page_size: u32,
    pub live_path: String,
    pub theme: String,
    pub refresh_interval: Duration,
    pub log_file: PathBuf,
}

impl TowerConfig {
    pub fn resolve(file: FileConfig, overrides: ConfigOverrides) -> Self {
        let access_token = overrides
            .access_token
            .or(file.access_token)
            .filter(|token| !token.trim().is_empty());

        Self {
            api_url: overrides
                .api_url
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            access_token,
            page_size: overrides
                .page_size
                .or(file.page_size)
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            live_path: overrides
                .live_path
                .or(file.live_path)
                .unwrap_or_else(|| DEFAULT_LIVE_PATH.to_string()),
            theme: file.theme.unwrap_or_else(|| "dark".to_string()),
            refresh_interval: file
                .refresh_interval_secs
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or(DEFAULT_REFRESH_INTERVAL),
            log_file: overrides.log_file.unwrap_or_else(default_log_file),
        }
    }
}

pub fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("tower-tui.log")
}
