//! Player controller implementation for trackdeck
//!
//! [`PlayerController`] is a handle to a single tokio task that owns the
//! [`PlaybackStateMachine`] and the [`PlaybackClock`]. Everything that can
//! change playback state is posted to that task's mailbox, so commands,
//! engine events and clock samples are applied strictly one after another.
//! Snapshots are published on a `watch` channel after every change.

use crate::catalog::{Catalog, TrackSelection};
use crate::engine::{EngineEventSink, MediaEngine};
use crate::player::clock::PlaybackClock;
use crate::player::queue::{Envelope, Mailbox};
use crate::player::state::{ClockDirective, PlaybackStateMachine, Transition};
use crate::player::{Command, EngineEvent, PlaybackState, Playlist};
use crate::utils::config::PlaybackConfig;
use crate::utils::error::{PlayerError, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Handle to a running playback controller
pub struct PlayerController {
    tx: mpsc::UnboundedSender<Envelope>,
    state_rx: watch::Receiver<PlaybackState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerController {
    /// Start a controller task driving `engine`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: Arc<dyn MediaEngine>, config: PlaybackConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        engine.attach(EngineEventSink::new(tx.clone()));

        let clock = PlaybackClock::new(config.tick_interval(), Arc::clone(&engine), tx.clone());
        let machine = PlaybackStateMachine::new(engine, config);
        let (state_tx, state_rx) = watch::channel(machine.snapshot());

        let actor = ControllerTask {
            machine,
            clock,
            state_tx,
        };
        let task = tokio::spawn(actor.run(Mailbox::new(rx)));

        info!("Playback controller started");

        Self {
            tx,
            state_rx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Apply a command and wait for its validation result
    ///
    /// The engine's asynchronous outcome is observed through the state, not
    /// through this return value.
    pub async fn dispatch(&self, command: Command) -> Result<()> {
        let (ack, ack_rx) = oneshot::channel();
        self.send(Envelope::Command { command, ack })?;

        let outcome = ack_rx.await.map_err(|_| PlayerError::ControllerClosed)?;
        outcome.map_err(PlayerError::from)
    }

    /// Queue a command without waiting for it to be applied
    pub fn post(&self, command: Command) -> Result<()> {
        let (ack, _) = oneshot::channel();
        self.send(Envelope::Command { command, ack })
    }

    /// Latest published snapshot; never blocks
    pub fn current_state(&self) -> PlaybackState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is published
    ///
    /// Slow observers skip intermediate snapshots and see the latest one.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    /// Run `callback` for every published snapshot until the controller stops
    pub fn subscribe_with<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(&PlaybackState) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                callback(&state);
            }
        })
    }

    /// Replace the playlist; resolves once it has been applied
    pub async fn load_playlist(&self, playlist: Playlist) -> Result<()> {
        let (ack, ack_rx) = oneshot::channel();
        self.send(Envelope::LoadPlaylist { playlist, ack })?;
        ack_rx.await.map_err(|_| PlayerError::ControllerClosed)
    }

    /// Fetch tracks from `catalog` and load them as the playlist
    ///
    /// Without a selection every available track is loaded. Returns the
    /// number of tracks in the new playlist. Catalog failures leave the
    /// current playlist untouched.
    pub async fn load_from_catalog(
        &self,
        catalog: &dyn Catalog,
        selection: Option<&TrackSelection>,
    ) -> Result<usize> {
        let tracks = match selection {
            Some(selection) => catalog.list_tracks(selection)?,
            None => catalog.list_available_tracks()?,
        };

        let count = tracks.len();
        self.load_playlist(Playlist::new(tracks)).await?;
        Ok(count)
    }

    /// Drop the playlist and return to idle
    pub async fn clear_playlist(&self) -> Result<()> {
        self.load_playlist(Playlist::empty()).await
    }

    /// Sink for feeding engine events into this controller
    pub fn event_sink(&self) -> EngineEventSink {
        EngineEventSink::new(self.tx.clone())
    }

    /// Stop the controller task and wait for it to finish
    ///
    /// Later calls on this handle fail with [`PlayerError::ControllerClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, ack_rx) = oneshot::channel();
        if self.send(Envelope::Shutdown { ack }).is_ok() {
            let _ = ack_rx.await;
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Controller task ended abnormally: {}", e);
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, envelope: Envelope) -> Result<()> {
        self.tx
            .send(envelope)
            .map_err(|_| PlayerError::ControllerClosed)
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        let (ack, _) = oneshot::channel();
        let _ = self.tx.send(Envelope::Shutdown { ack });
    }
}

/// State owned by the controller task
struct ControllerTask {
    machine: PlaybackStateMachine,
    clock: PlaybackClock,
    state_tx: watch::Sender<PlaybackState>,
}

impl ControllerTask {
    async fn run(mut self, mut mailbox: Mailbox) {
        while let Some(batch) = mailbox.next_batch().await {
            for envelope in batch {
                if !self.handle(envelope) {
                    mailbox.close();
                    info!("Playback controller stopped");
                    return;
                }
            }
        }

        self.clock.cancel();
        debug!("Controller mailbox drained, task exiting");
    }

    /// Apply one envelope; returns `false` when the task should stop
    fn handle(&mut self, envelope: Envelope) -> bool {
        match envelope {
            Envelope::Command { command, ack } => {
                let outcome = self.machine.apply(command);
                let reply = match outcome {
                    Ok(transition) => {
                        self.commit(transition);
                        Ok(())
                    }
                    Err(e) => {
                        debug!("Rejected {:?}: {}", command, e);
                        Err(e)
                    }
                };
                // Fire-and-forget callers have already dropped the receiver
                let _ = ack.send(reply);
            }

            Envelope::Event(event) => {
                debug!("Engine event {:?}", event);
                let transition = self.machine.fold(event);
                self.commit(transition);
            }

            Envelope::Tick { epoch, position_ms } => {
                if !self.clock.accepts(epoch) {
                    debug!("Discarding stale tick from epoch {}", epoch);
                    return true;
                }
                let transition = self.machine.fold(EngineEvent::PositionTick(position_ms));
                self.commit(transition);
            }

            Envelope::LoadPlaylist { playlist, ack } => {
                let transition = self.machine.load_playlist(playlist);
                self.commit(transition);
                let _ = ack.send(());
            }

            Envelope::Shutdown { ack } => {
                self.clock.cancel();
                let _ = ack.send(());
                return false;
            }
        }
        true
    }

    fn commit(&mut self, transition: Transition) {
        match transition.clock {
            ClockDirective::Arm => self.clock.arm(),
            ClockDirective::Cancel => self.clock.cancel(),
            ClockDirective::Resync => self.clock.resync(),
            ClockDirective::Unchanged => {}
        }
        self.clock.set_active(self.machine.should_tick());

        if transition.changed {
            self.state_tx.send_replace(self.machine.snapshot());
        }
    }
}
