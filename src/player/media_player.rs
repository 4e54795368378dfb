//! High-level player API for trackdeck
//!
//! [`PlayerBuilder`] wires an engine, configuration and an optional initial
//! playlist into a running [`PlayerController`]. [`StateSubscription`] is a
//! small convenience over the controller's snapshot channel.

use crate::engine::MediaEngine;
use crate::player::{PlaybackState, PlayerController, Playlist};
use crate::utils::config::PlaybackConfig;
use crate::utils::error::{PlayerError, Result};
use log::info;
use std::sync::Arc;
use tokio::sync::watch;

/// Player builder for customized configuration
#[derive(Default)]
pub struct PlayerBuilder {
    config: PlaybackConfig,
    engine: Option<Arc<dyn MediaEngine>>,
    playlist: Option<Playlist>,
}

impl PlayerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set playback configuration
    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the engine to drive
    pub fn with_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Playlist loaded before the controller is handed out
    pub fn with_playlist(mut self, playlist: Playlist) -> Self {
        self.playlist = Some(playlist);
        self
    }

    /// Start the controller
    pub async fn build(self) -> Result<PlayerController> {
        self.config.validate()?;
        let engine = self
            .engine
            .ok_or_else(|| PlayerError::Config("No media engine configured".to_string()))?;

        let controller = PlayerController::spawn(engine, self.config);
        if let Some(playlist) = self.playlist {
            info!("Loading initial playlist of {} tracks", playlist.len());
            controller.load_playlist(playlist).await?;
        }
        Ok(controller)
    }
}

/// Push subscription to playback snapshots
///
/// Delivers the most recent snapshot after each change. Snapshots published
/// while the subscriber is busy are collapsed into the latest one.
pub struct StateSubscription {
    rx: watch::Receiver<PlaybackState>,
}

impl StateSubscription {
    pub fn new(controller: &PlayerController) -> Self {
        Self {
            rx: controller.subscribe(),
        }
    }

    /// Wait for the next snapshot; `None` once the controller has stopped
    pub async fn changed(&mut self) -> Option<PlaybackState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Snapshot currently published, without waiting
    pub fn latest(&self) -> PlaybackState {
        self.rx.borrow().clone()
    }

    /// Wait until a snapshot satisfies `pred`, checking the current one first
    pub async fn wait_for<F>(&mut self, pred: F) -> Option<PlaybackState>
    where
        F: FnMut(&PlaybackState) -> bool,
    {
        let state = self.rx.wait_for(pred).await.ok()?;
        Some(state.clone())
    }
}
