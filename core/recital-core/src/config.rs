//! Server configuration loaded from TOML.
//!
//! Every field has a default, so a missing file (or a file that only sets a
//! few keys) is valid. The `[display]` table is forwarded to clients as the
//! bootstrap `config` blob via [`DisplayConfig::settings`].

use std::path::{Path, PathBuf};

use chrono::Duration;
use recital_protocol::DisplaySettings;
use serde::Deserialize;

use crate::error::{RecitalError, Result};

const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".recital/server.toml";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CONTROLLER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LIVENESS_INTERVAL_SECS: u64 = 5;
const MAX_CONTROLLER_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecitalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Host name or LAN address clients should use to reach this server.
    #[serde(default)]
    pub advertised_host: Option<String>,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        let host = match self.advertised_host.as_deref() {
            Some(host) if !host.trim().is_empty() => host.trim(),
            _ if self.host == "0.0.0.0" || self.host == "::" => "localhost",
            _ => self.host.as_str(),
        };
        format!("http://{}:{}", host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            advertised_host: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_controller_timeout_secs")]
    pub controller_timeout_secs: u64,
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,
    #[serde(default = "default_true")]
    pub reclaim_on_heartbeat: bool,
}

impl ControlConfig {
    pub fn controller_timeout(&self) -> Duration {
        Duration::seconds(self.controller_timeout_secs.min(MAX_CONTROLLER_TIMEOUT_SECS) as i64)
    }

    /// Never zero; a zero interval would spin the ticker.
    pub fn liveness_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.liveness_interval_secs.max(1))
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            controller_timeout_secs: DEFAULT_CONTROLLER_TIMEOUT_SECS,
            liveness_interval_secs: DEFAULT_LIVENESS_INTERVAL_SECS,
            reclaim_on_heartbeat: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_content_dir")]
    pub dir: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dir: default_content_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_transliteration: bool,
    #[serde(default = "default_true")]
    pub show_translation: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl DisplayConfig {
    pub fn settings(&self) -> DisplaySettings {
        DisplaySettings {
            show_transliteration: self.show_transliteration,
            show_translation: self.show_translation,
            theme: self.theme.clone(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_transliteration: true,
            show_translation: true,
            theme: default_theme(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_controller_timeout_secs() -> u64 {
    DEFAULT_CONTROLLER_TIMEOUT_SECS
}

fn default_liveness_interval_secs() -> u64 {
    DEFAULT_LIVENESS_INTERVAL_SECS
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_true() -> bool {
    true
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(RecitalError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_RELATIVE_PATH))
}

/// Loads the config file, falling back to defaults when it does not exist.
pub fn load_config(path: Option<&Path>) -> Result<RecitalConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(RecitalConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| RecitalError::Io {
        context: format!("reading config {}", config_path.display()),
        source,
    })?;
    toml::from_str::<RecitalConfig>(&content).map_err(|err| RecitalError::ConfigMalformed {
        path: config_path.clone(),
        details: err.to_string(),
    })
}
