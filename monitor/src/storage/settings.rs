//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for daily rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Local view server configuration
    #[serde(default)]
    pub view_server: ViewServerSettings,

    /// Print the view to the terminal
    #[serde(default = "default_true")]
    pub console_output: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            backend: BackendSettings::default(),
            view_server: ViewServerSettings::default(),
            console_output: true,
        }
    }
}

/// Backend API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the job API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Timeout of one-shot requests, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Local view server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_view_host")]
    pub host: String,

    #[serde(default = "default_view_port")]
    pub port: u16,
}

fn default_view_host() -> String {
    "127.0.0.1".to_string()
}

fn default_view_port() -> u16 {
    8090
}

impl Default for ViewServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_view_host(),
            port: default_view_port(),
        }
    }
}

/// Load settings from `path`. A missing file yields the defaults; an
/// unreadable or invalid one is an error.
pub async fn load_settings(path: &Path) -> Result<Settings, MonitorError> {
    let file = File::new(path);
    if !file.exists().await {
        info!("Settings file {} not found, using defaults", path.display());
        return Ok(Settings::default());
    }

    file.read_json::<Settings>().await.map_err(|e| {
        MonitorError::ConfigError(format!("invalid settings file {}: {}", path.display(), e))
    })
}
