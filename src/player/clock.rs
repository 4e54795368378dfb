//! Periodic position sampling
//!
//! The clock never computes a position itself. While active it asks the
//! engine where it is and posts the answer to the controller mailbox, tagged
//! with the epoch it was armed in. Cancelling bumps the epoch, so a sample
//! that was already in flight is recognized as stale and discarded.

use crate::engine::MediaEngine;
use crate::player::Envelope;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Cancellable ticker feeding position samples into the controller queue
pub struct PlaybackClock {
    interval: Duration,
    engine: Arc<dyn MediaEngine>,
    tx: mpsc::UnboundedSender<Envelope>,

    /// Incremented on every arm and cancel
    epoch: u64,

    /// Gate the running task waits on; `None` while disarmed
    active: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackClock {
    pub fn new(
        interval: Duration,
        engine: Arc<dyn MediaEngine>,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            interval,
            engine,
            tx,
            epoch: 0,
            active: None,
            task: None,
        }
    }

    /// Start a fresh epoch. The clock stays silent until [`set_active`] is
    /// called with `true`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// [`set_active`]: PlaybackClock::set_active
    pub fn arm(&mut self) {
        self.cancel();

        let (active_tx, active_rx) = watch::channel(false);
        let task = tokio::spawn(run_clock(
            self.epoch,
            self.interval,
            Arc::clone(&self.engine),
            self.tx.clone(),
            active_rx,
        ));

        debug!("Playback clock armed (epoch {})", self.epoch);
        self.active = Some(active_tx);
        self.task = Some(task);
    }

    /// Open or close the gate. No effect while disarmed.
    pub fn set_active(&mut self, active: bool) {
        if let Some(gate) = &self.active {
            gate.send_if_modified(|current| {
                let modified = *current != active;
                *current = active;
                modified
            });
        }
    }

    /// Retire the current epoch and keep sampling under a new one
    ///
    /// The gate starts closed again; the caller reopens it. No effect while
    /// disarmed.
    pub fn resync(&mut self) {
        if self.is_armed() {
            self.arm();
        }
    }

    /// Stop ticking and retire the current epoch
    pub fn cancel(&mut self) {
        self.epoch += 1;
        self.active = None;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Playback clock cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a sample taken during `epoch` may still be applied
    pub fn accepts(&self, epoch: u64) -> bool {
        self.is_armed() && epoch == self.epoch
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_clock(
    epoch: u64,
    period: Duration,
    engine: Arc<dyn MediaEngine>,
    tx: mpsc::UnboundedSender<Envelope>,
    mut active: watch::Receiver<bool>,
) {
    loop {
        while !*active.borrow_and_update() {
            if active.changed().await.is_err() {
                return;
            }
        }

        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let position_ms = engine.current_position_ms();
                    if tx.send(Envelope::Tick { epoch, position_ms }).is_err() {
                        return;
                    }
                }
                changed = active.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*active.borrow_and_update() {
                        break;
                    }
                }
            }
        }
    }
}
