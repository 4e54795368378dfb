//! Playback state machine for trackdeck
//!
//! The machine owns the playlist, the selected index and the playback
//! snapshot. It turns commands into engine calls and folds engine events
//! into state. The controller task is its only caller.

use crate::engine::MediaEngine;
use crate::player::{Command, EngineEvent, Phase, PlaybackState, Playlist, Track};
use crate::utils::config::PlaybackConfig;
use crate::utils::error::ValidationError;
use crate::utils::progress;
use log::{debug, info, warn};
use std::sync::Arc;

/// What the controller should do with the playback clock after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDirective {
    Unchanged,
    /// Start a new clock epoch for a freshly selected track
    Arm,
    /// Stop sampling and retire the current epoch
    Cancel,
    /// Keep sampling under a new epoch; samples taken before a seek are stale
    Resync,
}

/// Outcome of applying one command or event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Whether the published snapshot changed
    pub changed: bool,
    pub clock: ClockDirective,
}

impl Transition {
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            clock: ClockDirective::Unchanged,
        }
    }

    pub fn changed() -> Self {
        Self {
            changed: true,
            clock: ClockDirective::Unchanged,
        }
    }

    fn with_clock(mut self, clock: ClockDirective) -> Self {
        self.clock = clock;
        self
    }
}

/// Two-phase play flag
///
/// A play/pause command writes `requested`; the engine's `PlayingChanged`
/// writes `confirmed` and clears the request. Observers see the request
/// while it is pending and the engine's word otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayFlag {
    requested: Option<bool>,
    confirmed: bool,
}

impl PlayFlag {
    pub fn visible(&self) -> bool {
        self.requested.unwrap_or(self.confirmed)
    }

    pub fn is_pending(&self) -> bool {
        self.requested.is_some()
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    fn request(&mut self, playing: bool) {
        self.requested = Some(playing);
    }

    fn withdraw(&mut self) {
        self.requested = None;
    }

    fn confirm(&mut self, playing: bool) {
        self.confirmed = playing;
        self.requested = None;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The playback controller's state and transition rules
pub struct PlaybackStateMachine {
    engine: Arc<dyn MediaEngine>,
    config: PlaybackConfig,
    playlist: Playlist,
    current_index: Option<usize>,
    play: PlayFlag,
    position_ms: u64,
    duration_ms: u64,
    phase: Phase,
    last_error: Option<String>,
}

impl PlaybackStateMachine {
    pub fn new(engine: Arc<dyn MediaEngine>, config: PlaybackConfig) -> Self {
        Self {
            engine,
            config,
            playlist: Playlist::empty(),
            current_index: None,
            play: PlayFlag::default(),
            position_ms: 0,
            duration_ms: 0,
            phase: Phase::Idle,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn play_flag(&self) -> PlayFlag {
        self.play
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.playlist.get(i))
    }

    /// Position samples are only wanted while a ready track is playing
    pub fn should_tick(&self) -> bool {
        self.phase == Phase::Ready && self.play.visible()
    }

    /// Build the snapshot published to observers
    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.current_index,
            is_playing: self.play.visible(),
            play_request_pending: self.play.is_pending(),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            phase: self.phase,
            percent: progress::percent(self.position_ms as i64, self.duration_ms as i64),
            elapsed: progress::format(self.position_ms as i64),
            playlist_len: self.playlist.len(),
            track: self.current_track().cloned(),
            last_error: self.last_error.clone(),
        }
    }

    /// Apply a UI command
    ///
    /// Validation failures leave the state untouched.
    pub fn apply(&mut self, command: Command) -> Result<Transition, ValidationError> {
        debug!("Applying command {:?}", command);

        match command {
            Command::PlayPause => self.play_pause(),
            Command::SeekToPercent(percent) | Command::SetProgress(percent) => {
                self.seek_to_percent(percent)
            }
            Command::SeekToNext => self.step(1),
            Command::SeekToPrevious => self.step(-1),
            Command::SeekForward => self.seek_relative(self.config.seek_forward_ms as i64),
            Command::SeekBackward => self.seek_relative(-(self.config.seek_backward_ms as i64)),
            Command::SelectIndex(index) => self.select_index(index),
            Command::Stop => Ok(self.stop()),
        }
    }

    /// Fold an engine report into state
    pub fn fold(&mut self, event: EngineEvent) -> Transition {
        match event {
            EngineEvent::Buffering(position_ms) => {
                if self.phase == Phase::Idle {
                    debug!("Ignoring buffering report while idle");
                    return Transition::unchanged();
                }
                self.phase = Phase::Loading;
                self.position_ms = self.clamp_position(position_ms);
                Transition::changed()
            }

            EngineEvent::Ready(duration_ms) => {
                if self.phase == Phase::Idle {
                    debug!("Ignoring ready report while idle");
                    return Transition::unchanged();
                }
                info!("Track ready, duration {}", progress::format(duration_ms as i64));
                self.duration_ms = duration_ms;
                self.phase = Phase::Ready;
                self.position_ms = self.clamp_position(self.position_ms);
                self.last_error = None;
                Transition::changed()
            }

            EngineEvent::PlayingChanged(playing) => {
                if self.play.is_pending() && self.play.visible() != playing {
                    debug!("Engine overrode optimistic play state with {}", playing);
                }
                let before = self.play;
                self.play.confirm(playing);
                if before == self.play {
                    Transition::unchanged()
                } else {
                    Transition::changed()
                }
            }

            EngineEvent::PositionTick(position_ms) => {
                if self.phase != Phase::Ready {
                    return Transition::unchanged();
                }
                let position_ms = self.clamp_position(position_ms);
                if position_ms == self.position_ms {
                    return Transition::unchanged();
                }
                self.position_ms = position_ms;
                Transition::changed()
            }

            EngineEvent::TrackChanged(index) => self.engine_moved_to(index),

            EngineEvent::Ended => self.track_ended(),

            EngineEvent::LoadFailed(reason) => {
                warn!(
                    "Engine failed to load track {:?}: {}",
                    self.current_index, reason
                );
                self.phase = Phase::Idle;
                self.duration_ms = 0;
                self.position_ms = 0;
                self.play.reset();
                self.last_error = Some(reason);
                Transition::changed().with_clock(ClockDirective::Cancel)
            }
        }
    }

    /// Replace the playlist wholesale
    ///
    /// If the track that was selected is still present its index is
    /// remapped and playback carries on; otherwise the session is reset.
    pub fn load_playlist(&mut self, playlist: Playlist) -> Transition {
        let previous = self.current_track().map(|t| t.id.clone());

        if let Err(e) = self.engine.set_playlist(playlist.tracks()) {
            warn!("Engine rejected playlist: {}", e);
        }
        self.playlist = playlist;
        info!("Loaded playlist with {} tracks", self.playlist.len());

        if let Some(index) = previous.and_then(|id| self.playlist.position_of(&id)) {
            debug!("Selected track kept at index {}", index);
            self.current_index = Some(index);
            return Transition::changed();
        }

        if self.phase != Phase::Idle {
            if let Err(e) = self.engine.stop() {
                warn!("Engine stop failed while replacing playlist: {}", e);
            }
        }
        self.current_index = None;
        self.phase = Phase::Idle;
        self.play.reset();
        self.position_ms = 0;
        self.duration_ms = 0;
        self.last_error = None;
        Transition::changed().with_clock(ClockDirective::Cancel)
    }

    fn select_index(&mut self, index: usize) -> Result<Transition, ValidationError> {
        let track = self
            .playlist
            .get(index)
            .cloned()
            .ok_or(ValidationError::OutOfRange {
                index,
                len: self.playlist.len(),
            })?;

        info!("Selecting track {} ({})", index, track.title);
        self.current_index = Some(index);
        self.phase = Phase::Loading;
        self.duration_ms = 0;
        self.position_ms = 0;

        let start_playing = self.config.start_playing_on_select;
        self.play.request(start_playing);

        if let Err(e) = self.engine.load(index, &track, start_playing) {
            return Ok(self.fold(EngineEvent::LoadFailed(e.to_string())));
        }

        Ok(Transition::changed().with_clock(ClockDirective::Arm))
    }

    fn play_pause(&mut self) -> Result<Transition, ValidationError> {
        let index = self.current_index.ok_or(ValidationError::NoActiveTrack)?;
        let want_playing = !self.play.visible();

        // A stopped, failed or finished track has nothing loaded to resume
        if want_playing && matches!(self.phase, Phase::Idle | Phase::Ended) {
            return self.select_index(index);
        }

        self.play.request(want_playing);
        let result = if want_playing {
            self.engine.play()
        } else {
            self.engine.pause()
        };

        if let Err(e) = result {
            warn!("Engine refused {}: {}", if want_playing { "play" } else { "pause" }, e);
            self.play.withdraw();
        }

        Ok(Transition::changed())
    }

    fn seek_to_percent(&mut self, percent: f32) -> Result<Transition, ValidationError> {
        let target = progress::position_for_percent(percent, self.duration_ms)
            .ok_or(ValidationError::SeekUnavailable)?;
        Ok(self.seek_absolute(target))
    }

    fn seek_relative(&mut self, delta_ms: i64) -> Result<Transition, ValidationError> {
        if self.current_index.is_none() {
            return Err(ValidationError::NoActiveTrack);
        }
        if self.duration_ms == 0 {
            return Err(ValidationError::SeekUnavailable);
        }

        let target = if delta_ms >= 0 {
            self.position_ms
                .saturating_add(delta_ms as u64)
                .min(self.duration_ms)
        } else {
            self.position_ms.saturating_sub(delta_ms.unsigned_abs())
        };
        Ok(self.seek_absolute(target))
    }

    fn seek_absolute(&mut self, target_ms: u64) -> Transition {
        match self.engine.seek_to(target_ms) {
            Ok(()) => {
                debug!("Seek to {}", progress::format(target_ms as i64));
                self.position_ms = target_ms;
                Transition::changed().with_clock(ClockDirective::Resync)
            }
            Err(e) => {
                warn!("Engine refused seek to {}ms: {}", target_ms, e);
                Transition::unchanged()
            }
        }
    }

    /// Move by one track; no wrap at either end
    fn step(&mut self, direction: isize) -> Result<Transition, ValidationError> {
        let current = self.current_index.ok_or(ValidationError::NoActiveTrack)?;

        match current
            .checked_add_signed(direction)
            .filter(|&next| next < self.playlist.len())
        {
            Some(next) => self.select_index(next),
            None => {
                debug!("Already at playlist boundary ({}), not wrapping", current);
                Ok(Transition::unchanged())
            }
        }
    }

    fn stop(&mut self) -> Transition {
        info!("Stopping playback");
        if let Err(e) = self.engine.stop() {
            warn!("Engine stop failed: {}", e);
        }
        self.phase = Phase::Idle;
        self.play.reset();
        self.position_ms = 0;
        self.duration_ms = 0;
        Transition::changed().with_clock(ClockDirective::Cancel)
    }

    /// Engine advanced on its own (gapless); no load is issued
    fn engine_moved_to(&mut self, index: usize) -> Transition {
        if self.phase == Phase::Idle {
            debug!("Ignoring track change while idle");
            return Transition::unchanged();
        }
        let Some(track) = self.playlist.get(index) else {
            warn!(
                "Engine reported track {} but playlist has {} tracks",
                index,
                self.playlist.len()
            );
            return Transition::unchanged();
        };
        if self.current_index == Some(index) {
            return Transition::unchanged();
        }

        info!("Engine moved to track {} ({})", index, track.title);
        self.duration_ms = track.duration_ms;
        self.current_index = Some(index);
        self.position_ms = 0;
        self.phase = if self.duration_ms > 0 {
            Phase::Ready
        } else {
            Phase::Loading
        };
        Transition::changed()
    }

    fn track_ended(&mut self) -> Transition {
        if self.phase == Phase::Idle {
            debug!("Ignoring end of track while idle");
            return Transition::unchanged();
        }

        self.phase = Phase::Ended;
        self.position_ms = self.duration_ms;

        let successor = self
            .current_index
            .and_then(|i| i.checked_add(1))
            .filter(|&next| next < self.playlist.len());

        match successor {
            Some(next) => match self.select_index(next) {
                Ok(transition) => transition,
                Err(e) => {
                    warn!("Auto-advance failed: {}", e);
                    Transition::changed().with_clock(ClockDirective::Cancel)
                }
            },
            None => {
                info!("Reached end of playlist");
                self.play.reset();
                Transition::changed().with_clock(ClockDirective::Cancel)
            }
        }
    }

    fn clamp_position(&self, position_ms: u64) -> u64 {
        if self.duration_ms > 0 {
            position_ms.min(self.duration_ms)
        } else {
            position_ms
        }
    }
}
