//! Media engine boundary for trackdeck
//!
//! The engine does the actual decoding and output. The controller only
//! needs the small transport surface in [`MediaEngine`] plus a way for the
//! engine to report what happened, which is the [`EngineEventSink`].

mod simulated;

pub use simulated::SimulatedEngine;

use crate::player::{EngineEvent, Envelope, Track};
use crate::utils::error::EngineError;
use log::debug;
use tokio::sync::mpsc;

/// Result of an engine call
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Media engine trait defining what the controller needs from a renderer
///
/// Every method must return promptly. Work that takes time (opening a file,
/// buffering) is reported later through the [`EngineEventSink`] handed to
/// [`MediaEngine::attach`]. An `Err` return means the request was refused
/// outright.
pub trait MediaEngine: Send + Sync {
    /// Receive the sink used to report events
    ///
    /// Called once when a controller takes ownership of the engine.
    fn attach(&self, sink: EngineEventSink);

    /// Replace the engine's playlist
    fn set_playlist(&self, tracks: &[Track]) -> EngineResult<()>;

    /// Load the track at `index` and optionally start playing it
    ///
    /// Load failures discovered later arrive as [`EngineEvent::LoadFailed`].
    fn load(&self, index: usize, track: &Track, start_playing: bool) -> EngineResult<()>;

    /// Resume playback; confirmed by [`EngineEvent::PlayingChanged`]
    fn play(&self) -> EngineResult<()>;

    /// Pause playback; confirmed by [`EngineEvent::PlayingChanged`]
    fn pause(&self) -> EngineResult<()>;

    /// Stop playback and release the current item
    fn stop(&self) -> EngineResult<()>;

    /// Seek to an absolute position; the next tick re-confirms it
    fn seek_to(&self, position_ms: u64) -> EngineResult<()>;

    /// Current playback position
    fn current_position_ms(&self) -> u64;
}

/// Handle an engine uses to push events into a controller's mailbox
///
/// Events are never applied on the engine's thread; they are queued and
/// folded in order by the controller task. Once the controller shuts down
/// the sink is detached and further events are dropped.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EngineEventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// Queue an event. Returns `false` when the controller is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        match self.tx.send(Envelope::Event(event)) {
            Ok(()) => true,
            Err(err) => {
                debug!("Dropping engine event after detach: {:?}", err.0);
                false
            }
        }
    }

    /// Whether the controller still accepts events
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}
