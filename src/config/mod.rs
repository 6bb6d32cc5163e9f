//! Configuration loading for proxywatch
//!
//! Configuration lives in `~/.proxywatch/config.toml`. A missing file is not
//! an error; defaults are used. Every load normalizes monitor settings so
//! callers always see clamped values.

pub mod defaults;
pub mod types;

pub use types::{Config, FallbackConfig, MonitorConfig, MonitorConfigUpdate, ReachabilityConfig};

use crate::core::proxy::reachability::config::{normalize_target, validate_endpoint};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV_VAR: &str = "PROXYWATCH_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,
    #[error("Config read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Resolve the config path (`PROXYWATCH_CONFIG` or `~/.proxywatch/config.toml`)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV_VAR) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(home.join(".proxywatch").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load and normalize a config file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.monitor.normalize();
        Ok(config)
    }

    /// Write a default config file unless one already exists
    pub fn init() -> Result<PathBuf, ConfigError> {
        let path = Self::config_path()?;
        Self::init_at(&path)?;
        Ok(path)
    }

    /// Returns true if a new file was written
    pub fn init_at(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default().to_toml_string()?)?;
        Ok(true)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn print(&self) -> Result<(), ConfigError> {
        println!("{}", self.to_toml_string()?);
        Ok(())
    }

    /// Validate values that cannot be clamped (URLs and targets)
    pub fn check(&self) -> Result<(), ConfigError> {
        if let Some(proxy) = &self.fallback.proxy_url {
            validate_endpoint(proxy)
                .map_err(|e| ConfigError::Invalid(format!("fallback.proxy_url: {}", e)))?;
        }

        if self.reachability.targets.is_empty() {
            return Err(ConfigError::Invalid(
                "reachability.targets must not be empty".to_string(),
            ));
        }
        for target in &self.reachability.targets {
            normalize_target(target).map_err(|e| {
                ConfigError::Invalid(format!("reachability.targets '{}': {}", target, e))
            })?;
        }

        if self.reachability.background_timeout_ms == 0
            || self.reachability.interactive_timeout_ms == 0
        {
            return Err(ConfigError::Invalid(
                "reachability timeouts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
