//! Configuration management for trackdeck
//!
//! This module handles loading and managing application configuration
//! from various sources including config files and environment variables.

use crate::utils::error::{IntoPlayerError, PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playback controller configuration
    pub playback: PlaybackConfig,

    /// Track catalog configuration
    pub catalog: CatalogConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// Playback controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between position samples while playing
    pub tick_interval_ms: u64,

    /// Step for a forward relative seek
    pub seek_forward_ms: u64,

    /// Step for a backward relative seek
    pub seek_backward_ms: u64,

    /// Ask the engine to start playing as soon as a track is selected
    pub start_playing_on_select: bool,
}

/// Track catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// TOML manifest listing the available tracks
    pub manifest_path: Option<PathBuf>,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            seek_forward_ms: 15_000,
            seek_backward_ms: 5_000,
            start_playing_on_select: true,
        }
    }
}

impl PlaybackConfig {
    /// Tick interval as a Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate playback values
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::Config("Tick interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/trackdeck/config.toml on Linux)
    /// 3. User config file (~/.config/trackdeck/config.toml on Linux)
    /// 4. Environment variables (TRACKDECK_* prefix)
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same as [`Config::load`], with an explicit file applied after the user file
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config.merge_from_file(&system_path)?;
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config.merge_from_file(&user_path)?;
            }
        }

        if let Some(path) = explicit {
            config.merge_from_file(path)?;
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| PlayerError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Write configuration as TOML to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Merge configuration from a TOML file
    ///
    /// Every section carries `#[serde(default)]`, so keys missing from the
    /// file fall back to defaults rather than to earlier layers.
    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        *self = toml::from_str(&contents).config_err("Failed to parse config file")?;
        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(tick) = std::env::var("TRACKDECK_TICK_INTERVAL_MS") {
            self.playback.tick_interval_ms = tick
                .parse()
                .map_err(|_| PlayerError::Config("Invalid TRACKDECK_TICK_INTERVAL_MS".to_string()))?;
        }

        if let Ok(step) = std::env::var("TRACKDECK_SEEK_FORWARD_MS") {
            self.playback.seek_forward_ms = step
                .parse()
                .map_err(|_| PlayerError::Config("Invalid TRACKDECK_SEEK_FORWARD_MS".to_string()))?;
        }

        if let Ok(step) = std::env::var("TRACKDECK_SEEK_BACKWARD_MS") {
            self.playback.seek_backward_ms = step
                .parse()
                .map_err(|_| PlayerError::Config("Invalid TRACKDECK_SEEK_BACKWARD_MS".to_string()))?;
        }

        if let Ok(manifest) = std::env::var("TRACKDECK_MANIFEST") {
            self.catalog.manifest_path = Some(PathBuf::from(manifest));
        }

        if let Ok(log_level) = std::env::var("TRACKDECK_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(PlayerError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/trackdeck/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("trackdeck").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/trackdeck/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("trackdeck").join("config.toml"))
    }
}
