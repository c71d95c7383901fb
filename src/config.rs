use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::terminal::history::DEFAULT_HISTORY_LIMIT;
use crate::upload::DEFAULT_MAX_FILE_BYTES;

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Root of the file-storage REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Websocket endpoint of the terminal backend.
    #[serde(default = "default_terminal_url")]
    pub terminal_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            terminal_url: default_terminal_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    /// Commands kept for up/down recall; the oldest is dropped when full.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}
fn default_terminal_url() -> String {
    "ws://127.0.0.1:3000/terminal".to_string()
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

/// Top-level configuration persisted to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identity sent with terminal `start`. Falls back to `$USER`.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub terminal: TerminalSettings,
    #[serde(default)]
    pub upload: UploadSettings,
}

impl Config {
    /// Return the path to the config file:
    /// `~/.config/cloudide/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("cloudide");
        Ok(config_dir.join("config.toml"))
    }

    /// Load the config from disk, or return the default if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Save the current config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn resolved_user_id(&self) -> String {
        self.user_id
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    pub fn terminal_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server.terminal_url)
            .with_context(|| format!("Invalid terminal url '{}'", self.server.terminal_url))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => anyhow::bail!("Terminal url must use ws or wss, got '{other}'"),
        }
    }
}
