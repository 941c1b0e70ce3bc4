//! Configuration management for Roundtable
//!
//! Handles loading, saving, and validating the client configuration:
//! where the research backend lives and how the orchestrator behaves.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Environment variable that overrides `server.base_url`
pub const SERVER_URL_ENV: &str = "ROUNDTABLE_SERVER_URL";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Research backend settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Orchestrator and stream settings
    #[serde(default)]
    pub stream: StreamConfig,
    /// General application settings
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Config {
    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        self.server.url()?;
        if self.general.default_analysts < crate::types::MIN_ANALYSTS
            || self.general.default_analysts > crate::types::MAX_ANALYSTS
        {
            return Err(Error::Config(format!(
                "default_analysts must be between {} and {}",
                crate::types::MIN_ANALYSTS,
                crate::types::MAX_ANALYSTS
            )));
        }
        Ok(())
    }
}

/// Research backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the research API
    pub base_url: String,
    /// Timeout for REST requests (seconds); does not apply to the live stream
    pub request_timeout_secs: u64,
    /// Connection timeout for REST requests and the live stream (seconds)
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("Roundtable/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ServerConfig {
    /// Parse and check the base URL
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid base_url '{}': {}", self.base_url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!("base_url cannot be a base: {}", self.base_url)));
        }

        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Buffer size of the broadcast channel feeding frontends
    pub output_capacity: usize,
    /// Maximum number of undismissed notifications kept
    pub notification_limit: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            output_capacity: 256,
            notification_limit: 50,
        }
    }
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,
    /// Analyst count used when none is given
    pub default_analysts: u32,
    /// Ask before deleting a session
    pub confirm_deletes: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_analysts: 3,
            confirm_deletes: true,
        }
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                config.server.base_url = url.trim().to_string();
            }
        }

        config.validate()?;
        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("roundtable").join("config.toml"))
    }

    /// Load configuration from a file
    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        self.config.validate()?;

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Point the client at a different backend
    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> Result<()> {
        let previous = std::mem::replace(&mut self.config.server.base_url, base_url.into());
        if let Err(e) = self.config.server.url() {
            self.config.server.base_url = previous;
            return Err(e);
        }
        Ok(())
    }
}
