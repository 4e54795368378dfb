//! Error types for trackdeck
//!
//! This module defines the error taxonomy used throughout the crate.
//! We use thiserror for the library error types and anyhow for
//! application-level error handling in the binary.

use thiserror::Error;

/// Bad command arguments, reported synchronously to the caller.
///
/// A command that fails validation never mutates playback state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Index is outside `[0, len)`
    #[error("Index {index} out of range for playlist of {len} tracks")]
    OutOfRange { index: usize, len: usize },

    /// Seek requested without a known duration or with a bad percentage
    #[error("Seek unavailable")]
    SeekUnavailable,

    /// Command needs a selected track but none is selected
    #[error("No active track")]
    NoActiveTrack,
}

/// Failures reported by the media engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not load a track
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// The engine refused a transport request
    #[error("Engine rejected request: {0}")]
    Rejected(String),

    /// The engine is gone or not initialized
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the track catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog cannot be reached
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// A manifest file could not be read or parsed
    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

/// Main error type for trackdeck
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Rejected command
    #[error("Invalid command: {0}")]
    Validation(#[from] ValidationError),

    /// Engine-side failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Catalog failure
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// The controller task has shut down
    #[error("Controller is closed")]
    ControllerClosed,
}

impl PlayerError {
    /// Validation error carried by this error, if any
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            PlayerError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience type alias for Results in trackdeck
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Extension trait for converting other errors to PlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into a PlayerError with the given context
    fn config_err(self, context: &str) -> Result<T>;
    fn catalog_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayerError::Config(format!("{}: {}", context, e)))
    }

    fn catalog_err(self, context: &str) -> Result<T> {
        self.map_err(|e| CatalogError::Manifest(format!("{}: {}", context, e)).into())
    }
}
