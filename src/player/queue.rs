//! Serialized mailbox for the playback controller
//!
//! Commands, engine events, clock samples and playlist loads all travel
//! through one unbounded channel and are applied one at a time by the
//! controller task. Order is preserved; the only rewrite allowed is
//! dropping a position sample that is immediately superseded by a newer one
//! from the same source.

use crate::player::{Command, EngineEvent, Playlist};
use crate::utils::error::ValidationError;
use tokio::sync::{mpsc, oneshot};

/// Upper bound on items drained per wakeup
const MAX_BATCH: usize = 64;

/// Acknowledgment for a dispatched command
pub type CommandAck = oneshot::Sender<std::result::Result<(), ValidationError>>;

/// One unit of work for the controller task
#[derive(Debug)]
pub enum Envelope {
    /// UI command; `ack` receives the validation result once applied
    Command { command: Command, ack: CommandAck },

    /// Event reported by the engine
    Event(EngineEvent),

    /// Position sampled by the playback clock during `epoch`
    Tick { epoch: u64, position_ms: u64 },

    /// Replace the playlist
    LoadPlaylist {
        playlist: Playlist,
        ack: oneshot::Sender<()>,
    },

    /// Cancel the clock, detach the engine and stop the task
    Shutdown { ack: oneshot::Sender<()> },
}

impl Envelope {
    /// True when `next` makes `self` obsolete
    fn superseded_by(&self, next: &Envelope) -> bool {
        match (self, next) {
            (Envelope::Tick { epoch: a, .. }, Envelope::Tick { epoch: b, .. }) => a == b,
            (
                Envelope::Event(EngineEvent::PositionTick(_)),
                Envelope::Event(EngineEvent::PositionTick(_)),
            ) => true,
            _ => false,
        }
    }
}

/// Drop position samples that are directly followed by a newer sample from
/// the same source. Everything else keeps its relative order.
pub fn coalesce(batch: Vec<Envelope>) -> Vec<Envelope> {
    let mut out: Vec<Envelope> = Vec::with_capacity(batch.len());
    for envelope in batch {
        if out.last().is_some_and(|last| last.superseded_by(&envelope)) {
            out.pop();
        }
        out.push(envelope);
    }
    out
}

/// Receiving end of the controller queue
pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Mailbox {
    pub fn new(rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
        Self { rx }
    }

    /// Wait for work, then drain whatever else is already queued
    ///
    /// Returns `None` once every sender is gone.
    pub async fn next_batch(&mut self) -> Option<Vec<Envelope>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];

        while batch.len() < MAX_BATCH {
            match self.rx.try_recv() {
                Ok(envelope) => batch.push(envelope),
                Err(_) => break,
            }
        }

        Some(coalesce(batch))
    }

    /// Refuse further sends; producers observe a closed channel
    pub fn close(&mut self) {
        self.rx.close();
    }
}
