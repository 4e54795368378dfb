//! Playback control module for trackdeck
//!
//! This module owns playback intent (what should be playing, where, and in
//! which order) and reconciles it with the state the media engine reports
//! asynchronously. Commands from the UI and events from the engine flow
//! through one serialized mailbox into the [`PlaybackStateMachine`].

mod clock;
mod controller;
mod media_player;
mod queue;
mod state;

pub use clock::PlaybackClock;
pub use controller::PlayerController;
pub use media_player::{PlayerBuilder, StateSubscription};
pub use queue::{coalesce, Envelope, Mailbox};
pub use state::{ClockDirective, PlaybackStateMachine, PlayFlag, Transition};

use crate::utils::progress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a track within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One playable item
///
/// Tracks are produced by a catalog and never modified by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Session-unique identifier
    pub id: TrackId,

    /// Source locator (URI or path)
    pub source: String,

    /// Display title
    pub title: String,

    /// Artist name
    #[serde(default)]
    pub artist: String,

    /// Duration in milliseconds, 0 when unknown
    #[serde(default)]
    pub duration_ms: u64,

    /// Raw content descriptor handed to the engine untouched
    #[serde(default)]
    pub descriptor: String,
}

impl Track {
    /// Create a track with only the required fields set
    pub fn new(id: impl Into<String>, source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(id),
            source: source.into(),
            title: title.into(),
            artist: String::new(),
            duration_ms: 0,
            descriptor: String::new(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }
}

/// Ordered list of tracks; insertion order is play order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    tracks: Arc<[Track]>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Position of the first track carrying `id`
    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }
}

impl From<Vec<Track>> for Playlist {
    fn from(tracks: Vec<Track>) -> Self {
        Self::new(tracks)
    }
}

/// Coarse playback lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing selected, stopped, or the last load failed
    #[default]
    Idle,

    /// Track selected, waiting for the engine to report ready
    Loading,

    /// Duration known; may be playing or paused
    Ready,

    /// Current track finished
    Ended,
}

/// Intent issued by the UI
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Toggle play/pause on the current track
    PlayPause,

    /// Seek to a percentage of the current track (0-100)
    SeekToPercent(f32),

    /// Slider drag; same semantics as `SeekToPercent`
    SetProgress(f32),

    /// Select the next track, no wrap
    SeekToNext,

    /// Select the previous track, no wrap
    SeekToPrevious,

    /// Jump forward by the configured step
    SeekForward,

    /// Jump backward by the configured step
    SeekBackward,

    /// Load and play the track at the index
    SelectIndex(usize),

    /// Stop playback, keeping the playlist and selection
    Stop,
}

/// Asynchronous report from the media engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine is buffering at the given position
    Buffering(u64),

    /// Engine is ready; carries the duration in ms
    Ready(u64),

    /// Authoritative play/pause state
    PlayingChanged(bool),

    /// Position sample
    PositionTick(u64),

    /// Engine moved to another playlist index on its own
    TrackChanged(usize),

    /// Current track reached its end
    Ended,

    /// The engine could not load the current track
    LoadFailed(String),
}

/// Snapshot of playback state published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    /// Index into the playlist, `None` when nothing is selected
    pub current_index: Option<usize>,

    /// Play state as observers should display it
    pub is_playing: bool,

    /// True while a play/pause request awaits engine confirmation
    pub play_request_pending: bool,

    pub position_ms: u64,

    /// 0 while unknown
    pub duration_ms: u64,

    pub phase: Phase,

    /// Position as a percentage of duration
    pub percent: f32,

    /// Position rendered as `M:SS`
    pub elapsed: String,

    pub playlist_len: usize,

    /// Currently selected track
    pub track: Option<Track>,

    /// Most recent engine failure, cleared on the next successful load
    pub last_error: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_index: None,
            is_playing: false,
            play_request_pending: false,
            position_ms: 0,
            duration_ms: 0,
            phase: Phase::Idle,
            percent: 0.0,
            elapsed: progress::format(0),
            playlist_len: 0,
            track: None,
            last_error: None,
        }
    }
}

impl PlaybackState {
    /// Formatted duration, `--:--` while unknown
    pub fn total(&self) -> String {
        if self.duration_ms == 0 {
            progress::UNKNOWN_TIMESTAMP.to_string()
        } else {
            progress::format(self.duration_ms as i64)
        }
    }
}
