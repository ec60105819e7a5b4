//! RelayActor - Forwards published snapshots to the cloud relay
//!
//! Watches the snapshot channel and offers every new value to the
//! [`RelayPublisher`], which decides whether the rate limit allows a push.
//! While a push is in flight newer snapshots overwrite each other in the
//! channel, so the next offer always carries the freshest data.

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, instrument, trace};

use crate::TelemetrySnapshot;
use crate::relay::RelayPublisher;

use super::messages::{RelayCommand, RelayStats};

pub struct RelayActor {
    publisher: RelayPublisher,

    snapshot_rx: watch::Receiver<TelemetrySnapshot>,

    command_rx: mpsc::Receiver<RelayCommand>,

    stats: RelayStats,
}

impl RelayActor {
    pub fn new(
        publisher: RelayPublisher,
        snapshot_rx: watch::Receiver<TelemetrySnapshot>,
        command_rx: mpsc::Receiver<RelayCommand>,
    ) -> Self {
        Self {
            publisher,
            snapshot_rx,
            command_rx,
            stats: RelayStats::default(),
        }
    }

    #[instrument(skip(self), fields(enabled = self.publisher.is_enabled()))]
    pub async fn run(mut self) {
        debug!("starting relay actor");

        loop {
            tokio::select! {
                changed = self.snapshot_rx.changed() => {
                    if changed.is_err() {
                        debug!("snapshot channel closed, shutting down");
                        break;
                    }

                    let snapshot = self.snapshot_rx.borrow_and_update().clone();
                    let outcome = self.publisher.offer(&snapshot).await;
                    trace!("relay outcome: {outcome:?}");
                    self.stats.record(outcome);
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(RelayCommand::GetStats { respond_to }) => {
                            let _ = respond_to.send(self.stats);
                        }

                        Some(RelayCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            debug!("all handles dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("relay actor stopped (stats: {:?})", self.stats);
    }
}

/// Handle for controlling a RelayActor
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    pub fn spawn(
        publisher: RelayPublisher,
        snapshot_rx: watch::Receiver<TelemetrySnapshot>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = RelayActor::new(publisher, snapshot_rx, cmd_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    pub async fn stats(&self) -> Result<RelayStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive stats")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(RelayCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
