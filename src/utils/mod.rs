//! Utility module for trackdeck
//!
//! This module provides common utilities used throughout the crate:
//! - Error handling with custom error types
//! - Configuration management
//! - Progress and timestamp formatting

pub mod config;
pub mod error;
pub mod progress;

// Re-export commonly used items
pub use config::{CatalogConfig, Config, GeneralConfig, PlaybackConfig};
pub use error::{CatalogError, EngineError, PlayerError, Result, ValidationError};

/// Initialize the application configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
///
/// # Returns
///
/// Returns the loaded configuration or an error if loading fails
pub fn load_config() -> Result<Config> {
    Config::load()
}
