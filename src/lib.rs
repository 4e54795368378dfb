//! trackdeck - playlist playback controller
//!
//! The controller keeps what the user asked for (selected track, play or
//! pause, seek position) consistent with what an asynchronous media engine
//! reports back, and publishes the reconciled state as snapshots.

pub mod catalog;
pub mod engine;
pub mod player;
pub mod utils;

pub use catalog::{Catalog, InMemoryCatalog, ManifestCatalog, TrackSelection};
pub use engine::{EngineEventSink, MediaEngine, SimulatedEngine};
pub use player::{
    Command, EngineEvent, Phase, PlaybackState, PlayerBuilder, PlayerController, Playlist,
    StateSubscription, Track, TrackId,
};
pub use utils::{Config, PlayerError, Result, ValidationError};
