//! Integration test utilities for trackdeck
//!
//! This module provides common utilities for integration testing including:
//! - Temporary manifests and config files
//! - A recording engine that only moves when the test tells it to
//! - Helpers for waiting on published snapshots

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use trackdeck::engine::{EngineEventSink, EngineResult, MediaEngine};
use trackdeck::{EngineEvent, ManifestCatalog, PlaybackState, PlayerController, Track};

/// Test fixture owning a temporary directory
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `tracks` as a manifest and return its path
    pub fn manifest(&self, name: &str, tracks: &[Track]) -> Result<PathBuf> {
        let path = self.path().join(name);
        ManifestCatalog::write(&path, tracks)?;
        Ok(path)
    }

    /// Write raw text to a file in the fixture directory
    pub fn file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

/// `n` tracks of `duration_ms` each, ids `t0..tn`
pub fn sample_tracks(n: usize, duration_ms: u64) -> Vec<Track> {
    (0..n)
        .map(|i| {
            Track::new(
                format!("t{}", i),
                format!("/music/track{}.mp3", i),
                format!("Track {}", i),
            )
            .with_artist(if i % 2 == 0 { "Even" } else { "Odd" })
            .with_duration_ms(duration_ms)
        })
        .collect()
}

/// Engine call as seen by [`RecordingEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetPlaylist(usize),
    Load { index: usize, start_playing: bool },
    Play,
    Pause,
    Stop,
    Seek(u64),
}

/// Engine that records every call and reports only what the test emits
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    sink: Mutex<Option<EngineEventSink>>,
    position_ms: Mutex<u64>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn loads(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Load { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    /// Report an event as if the engine had produced it
    pub fn emit(&self, event: EngineEvent) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.emit(event);
        }
    }

    /// Position returned to the playback clock
    pub fn set_position(&self, position_ms: u64) {
        *self.position_ms.lock() = position_ms;
    }

    pub fn is_attached(&self) -> bool {
        self.sink
            .lock()
            .as_ref()
            .map(|s| s.is_attached())
            .unwrap_or(false)
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

impl MediaEngine for RecordingEngine {
    fn attach(&self, sink: EngineEventSink) {
        *self.sink.lock() = Some(sink);
    }

    fn set_playlist(&self, tracks: &[Track]) -> EngineResult<()> {
        self.record(EngineCall::SetPlaylist(tracks.len()));
        Ok(())
    }

    fn load(&self, index: usize, _track: &Track, start_playing: bool) -> EngineResult<()> {
        self.record(EngineCall::Load {
            index,
            start_playing,
        });
        Ok(())
    }

    fn play(&self) -> EngineResult<()> {
        self.record(EngineCall::Play);
        Ok(())
    }

    fn pause(&self) -> EngineResult<()> {
        self.record(EngineCall::Pause);
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        self.record(EngineCall::Stop);
        Ok(())
    }

    fn seek_to(&self, position_ms: u64) -> EngineResult<()> {
        self.record(EngineCall::Seek(position_ms));
        *self.position_ms.lock() = position_ms;
        Ok(())
    }

    fn current_position_ms(&self) -> u64 {
        *self.position_ms.lock()
    }
}

/// Upper bound on waiting for a snapshot; also covers virtual time in paused tests
pub const WAIT: Duration = Duration::from_secs(60);

/// Wait until the controller publishes a snapshot matching `pred`
pub async fn wait_for_state<F>(controller: &PlayerController, pred: F) -> Result<PlaybackState>
where
    F: FnMut(&PlaybackState) -> bool,
{
    let mut rx = controller.subscribe();
    let state = tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .map_err(|_| anyhow!("timed out waiting for state, last: {:?}", controller.current_state()))?
        .map_err(|_| anyhow!("controller stopped"))?;
    Ok(state.clone())
}

/// Let the controller drain its mailbox by round-tripping a command that is
/// always rejected and so never changes state
pub async fn settle(controller: &PlayerController) {
    let _ = controller
        .dispatch(trackdeck::Command::SeekToPercent(-1.0))
        .await;
}
