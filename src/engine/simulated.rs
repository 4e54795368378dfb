//! In-process engine with virtual playback timing
//!
//! Nothing is decoded. A loaded track "plays" by letting tokio time pass:
//! the position is derived from the instant playback last resumed, and a
//! timer reports the end of the track. Because it runs on tokio time the
//! engine behaves deterministically under a paused test clock.

use crate::engine::{EngineEventSink, EngineResult, MediaEngine};
use crate::player::{EngineEvent, Track};
use crate::utils::error::EngineError;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;

/// Duration assumed for tracks whose metadata does not carry one
const DEFAULT_TRACK_DURATION_MS: u64 = 180_000;

/// Time between a load request and the ready report
const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(150);

/// Sources with this prefix fail to load, for exercising error paths
pub const UNPLAYABLE_PREFIX: &str = "unplayable:";

#[derive(Default)]
struct Shared {
    sink: Option<EngineEventSink>,
    playlist: Vec<Track>,
    current: Option<usize>,
    duration_ms: u64,

    /// Position at the moment of the last pause/seek/resume
    base_position_ms: u64,

    /// Set while playing
    resumed_at: Option<Instant>,

    /// Bumped on every load and stop; stale load timers check it
    load_gen: u64,

    /// Bumped on every transport change; stale end timers check it
    end_gen: u64,
}

impl Shared {
    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    fn position_ms(&self) -> u64 {
        let played = self
            .resumed_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let position = self.base_position_ms.saturating_add(played);
        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    fn is_ready(&self) -> bool {
        self.current.is_some() && self.duration_ms > 0
    }

    fn remaining(&self) -> Duration {
        Duration::from_millis(self.duration_ms.saturating_sub(self.position_ms()))
    }
}

/// Media engine that simulates playback on the tokio clock
pub struct SimulatedEngine {
    shared: Arc<Mutex<Shared>>,
    load_delay: Duration,
    fallback_duration_ms: u64,
    gapless: bool,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            load_delay: DEFAULT_LOAD_DELAY,
            fallback_duration_ms: DEFAULT_TRACK_DURATION_MS,
            gapless: false,
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Duration used when a track's metadata has none
    pub fn with_fallback_duration_ms(mut self, duration_ms: u64) -> Self {
        self.fallback_duration_ms = duration_ms;
        self
    }

    /// Advance to the next playlist entry by itself at the end of a track,
    /// reporting `TrackChanged` instead of `Ended`
    pub fn with_gapless(mut self, gapless: bool) -> Self {
        self.gapless = gapless;
        self
    }

    fn runtime() -> EngineResult<Handle> {
        Handle::try_current()
            .map_err(|_| EngineError::Unavailable("no tokio runtime".to_string()))
    }

    fn duration_of(&self, track: &Track) -> u64 {
        if track.duration_ms > 0 {
            track.duration_ms
        } else {
            self.fallback_duration_ms
        }
    }

    /// Arm the end-of-track timer for the current transport generation
    fn schedule_end(&self, shared: &mut Shared, handle: &Handle) {
        shared.end_gen += 1;
        let generation = shared.end_gen;
        let remaining = shared.remaining();
        let state = Arc::clone(&self.shared);
        let gapless = self.gapless;
        let fallback = self.fallback_duration_ms;

        handle.spawn(async move {
            tokio::time::sleep(remaining).await;
            track_finished(state, generation, gapless, fallback);
        });
    }
}

/// End timer body; re-arms itself when advancing gaplessly
fn track_finished(state: Arc<Mutex<Shared>>, generation: u64, gapless: bool, fallback: u64) {
    let mut shared = state.lock();
    if shared.end_gen != generation || shared.resumed_at.is_none() {
        return;
    }

    let next = shared
        .current
        .map(|i| i + 1)
        .filter(|&i| i < shared.playlist.len());

    if let (true, Some(next)) = (gapless, next) {
        let duration = match shared.playlist[next].duration_ms {
            0 => fallback,
            d => d,
        };
        debug!("Simulated engine advancing to track {}", next);
        shared.current = Some(next);
        shared.duration_ms = duration;
        shared.base_position_ms = 0;
        shared.resumed_at = Some(Instant::now());
        shared.end_gen += 1;
        let generation = shared.end_gen;
        shared.emit(EngineEvent::TrackChanged(next));
        shared.emit(EngineEvent::Ready(duration));
        drop(shared);

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(duration)).await;
            track_finished(state, generation, gapless, fallback);
        });
        return;
    }

    shared.base_position_ms = shared.duration_ms;
    shared.resumed_at = None;
    shared.end_gen += 1;
    shared.emit(EngineEvent::PlayingChanged(false));
    shared.emit(EngineEvent::Ended);
}

impl MediaEngine for SimulatedEngine {
    fn attach(&self, sink: EngineEventSink) {
        self.shared.lock().sink = Some(sink);
    }

    fn set_playlist(&self, tracks: &[Track]) -> EngineResult<()> {
        self.shared.lock().playlist = tracks.to_vec();
        Ok(())
    }

    fn load(&self, index: usize, track: &Track, start_playing: bool) -> EngineResult<()> {
        let handle = Self::runtime()?;
        if track.source.is_empty() {
            return Err(EngineError::LoadFailed(format!(
                "track {} has no source",
                track.id
            )));
        }

        let mut shared = self.shared.lock();
        shared.load_gen += 1;
        shared.end_gen += 1;
        shared.current = Some(index);
        shared.duration_ms = 0;
        shared.base_position_ms = 0;
        shared.resumed_at = None;
        shared.emit(EngineEvent::Buffering(0));

        let generation = shared.load_gen;
        let delay = self.load_delay;
        let unplayable = track.source.starts_with(UNPLAYABLE_PREFIX);
        let duration = self.duration_of(track);
        let source = track.source.clone();
        let state = Arc::clone(&self.shared);
        let gapless = self.gapless;
        let fallback = self.fallback_duration_ms;
        drop(shared);

        info!("Simulated engine loading {}", source);

        handle.spawn(async move {
            tokio::time::sleep(delay).await;

            let end_gen = {
                let mut shared = state.lock();
                if shared.load_gen != generation {
                    return;
                }

                if unplayable {
                    shared.current = None;
                    shared.emit(EngineEvent::LoadFailed(format!("cannot decode {}", source)));
                    return;
                }

                shared.duration_ms = duration;
                shared.emit(EngineEvent::Ready(duration));
                shared.emit(EngineEvent::PlayingChanged(start_playing));
                if !start_playing {
                    return;
                }

                shared.resumed_at = Some(Instant::now());
                shared.end_gen += 1;
                shared.end_gen
            };

            tokio::time::sleep(Duration::from_millis(duration)).await;
            track_finished(state, end_gen, gapless, fallback);
        });

        Ok(())
    }

    fn play(&self) -> EngineResult<()> {
        let handle = Self::runtime()?;
        let mut shared = self.shared.lock();
        if !shared.is_ready() {
            return Err(EngineError::Rejected("nothing loaded".to_string()));
        }

        if shared.resumed_at.is_none() {
            if shared.position_ms() >= shared.duration_ms {
                shared.base_position_ms = 0;
            }
            shared.resumed_at = Some(Instant::now());
            self.schedule_end(&mut shared, &handle);
        }
        shared.emit(EngineEvent::PlayingChanged(true));
        Ok(())
    }

    fn pause(&self) -> EngineResult<()> {
        let mut shared = self.shared.lock();
        if shared.current.is_none() {
            return Err(EngineError::Rejected("nothing loaded".to_string()));
        }

        shared.base_position_ms = shared.position_ms();
        shared.resumed_at = None;
        shared.end_gen += 1;
        shared.emit(EngineEvent::PlayingChanged(false));
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let mut shared = self.shared.lock();
        shared.load_gen += 1;
        shared.end_gen += 1;
        shared.current = None;
        shared.duration_ms = 0;
        shared.base_position_ms = 0;
        shared.resumed_at = None;
        shared.emit(EngineEvent::PlayingChanged(false));
        Ok(())
    }

    fn seek_to(&self, position_ms: u64) -> EngineResult<()> {
        let handle = Self::runtime()?;
        let mut shared = self.shared.lock();
        if !shared.is_ready() {
            return Err(EngineError::Rejected("nothing loaded".to_string()));
        }

        shared.base_position_ms = position_ms.min(shared.duration_ms);
        if shared.resumed_at.is_some() {
            shared.resumed_at = Some(Instant::now());
            self.schedule_end(&mut shared, &handle);
        }
        Ok(())
    }

    fn current_position_ms(&self) -> u64 {
        self.shared.lock().position_ms()
    }
}
