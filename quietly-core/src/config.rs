//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/quietly/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/quietly/` (~/.config/quietly/)
//! - Data: `$XDG_DATA_HOME/quietly/` (~/.local/share/quietly/)
//! - State/Logs: `$XDG_STATE_HOME/quietly/` (~/.local/state/quietly/)

use crate::analytics::WeekStart;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Calendar policy for goal windows
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Snapshot export configuration
    #[serde(default)]
    pub export: ExportConfig,
}

/// Calendar configuration
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct CalendarConfig {
    /// First day of the week for weekly goals
    #[serde(default)]
    pub week_start: WeekStart,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// How often to start a new log file
    #[serde(default)]
    pub rotation: LogRotation,
}

/// Log file rotation policy
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// One file per UTC day: `quietly.YYYY-MM-DD.log`
    #[default]
    Daily,
    /// A single `quietly.log`
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            rotation: LogRotation::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Snapshot export configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ExportConfig {
    /// Where `quietly export` writes the widget snapshot (defaults to the data dir)
    pub snapshot_path: Option<PathBuf>,
}

impl ExportConfig {
    /// Resolved snapshot path.
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("snapshot.json"))
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.logging.max_files == 0 {
            return Err(Error::Config(
                "logging.max_files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/quietly/config.toml` (~/.config/quietly/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("quietly").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/quietly/` (~/.local/share/quietly/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("quietly")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/quietly/` (~/.local/state/quietly/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("quietly")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/quietly/quietly.db` (~/.local/share/quietly/quietly.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("quietly.db")
    }
}
