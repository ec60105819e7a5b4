//! IngestActor - Turns the simulator's log file into the live snapshot
//!
//! ## Cycle
//!
//! ```text
//! tick → sample host → inspect telem file ─┬─ missing ─► status no_file
//!                                          ├─ stale   ─► status stale (sensors frozen)
//!                                          └─ fresh   ─► read, pick newest lines, parse
//!                                                         └─► status live + partial merge
//!      → one store update → mirror + watch publish
//! ```
//!
//! The three sensor groups are taken from the most recent line containing each
//! marker, scanning from the end of the file. They may come from different
//! lines because the producer does not always write them together.
//!
//! Errors never stop the actor; a failed cycle is logged and the next tick
//! starts from the previous snapshot.

use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::IngestConfig;
use crate::mirror::MirrorSink;
use crate::monitors::HostProbe;
use crate::parser::{Marker, ParsedFields, parse_line};
use crate::store::SnapshotStore;
use crate::{LinkStatus, TelemetrySnapshot};

use super::messages::IngestCommand;

/// Classification of the telemetry file for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Missing,
    Stale { age: Duration },
    Fresh { age: Duration },
    /// Exists but its metadata cannot be read
    Unreadable,
}

/// Classify the file at `path` by modification age relative to `now`.
///
/// A modification time in the future counts as age zero.
pub async fn inspect_file(path: &Path, stale_after: Duration, now: SystemTime) -> FileState {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return FileState::Missing,
        Err(e) => {
            warn!("cannot inspect {}: {e}", path.display());
            return FileState::Unreadable;
        }
    };

    let age = metadata
        .modified()
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .unwrap_or_default();

    if age > stale_after {
        FileState::Stale { age }
    } else {
        FileState::Fresh { age }
    }
}

/// Newest line per sensor marker
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SelectedLines<'a> {
    pub pressure: Option<&'a str>,
    pub imu: Option<&'a str>,
    pub ambient: Option<&'a str>,
}

impl<'a> SelectedLines<'a> {
    fn is_complete(&self) -> bool {
        self.pressure.is_some() && self.imu.is_some() && self.ambient.is_some()
    }

    /// Parse each selected line, keeping only the group it was selected for.
    pub fn fields(&self) -> ParsedFields {
        ParsedFields {
            pressure: self.pressure.and_then(|line| parse_line(line).pressure),
            imu: self.imu.and_then(|line| parse_line(line).imu),
            ambient_temp: self.ambient.and_then(|line| parse_line(line).ambient_temp),
            gps: None,
        }
    }
}

/// Scan `content` from the last line backwards, keeping the first line seen
/// for each of the pressure, IMU and temperature markers.
pub fn select_lines(content: &str) -> SelectedLines<'_> {
    let mut selected = SelectedLines::default();

    for line in content.lines().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if selected.pressure.is_none() && line.contains(Marker::Pressure.token()) {
            selected.pressure = Some(line);
        }
        if selected.imu.is_none() && line.contains(Marker::Imu.token()) {
            selected.imu = Some(line);
        }
        if selected.ambient.is_none() && line.contains(Marker::AmbientTemp.token()) {
            selected.ambient = Some(line);
        }

        if selected.is_complete() {
            break;
        }
    }

    selected
}

/// Actor that ingests the telemetry log on a fixed period
pub struct IngestActor {
    config: IngestConfig,

    store: SnapshotStore,

    /// Host metrics source, sampled every cycle
    probe: Box<dyn HostProbe>,

    /// Optional local JSON copy of every published snapshot
    mirror: Option<MirrorSink>,

    /// Latest published snapshot, consumed by the relay
    snapshot_tx: watch::Sender<TelemetrySnapshot>,

    command_rx: mpsc::Receiver<IngestCommand>,
}

impl IngestActor {
    pub fn new(
        config: IngestConfig,
        store: SnapshotStore,
        probe: Box<dyn HostProbe>,
        mirror: Option<MirrorSink>,
        snapshot_tx: watch::Sender<TelemetrySnapshot>,
        command_rx: mpsc::Receiver<IngestCommand>,
    ) -> Self {
        Self {
            config,
            store,
            probe,
            mirror,
            snapshot_tx,
            command_rx,
        }
    }

    /// Run until a Shutdown command arrives or every handle has been dropped
    #[instrument(skip(self), fields(file = %self.config.telem_file.display()))]
    pub async fn run(mut self) {
        debug!("starting ingest actor");

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("ingest cycle failed: {:#}", e);
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(IngestCommand::IngestNow { respond_to }) => {
                            trace!("received IngestNow command");
                            let result = self.run_cycle().await;
                            let _ = respond_to.send(result);
                        }

                        Some(IngestCommand::Shutdown) => {
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

        debug!("ingest actor stopped");
    }

    /// One ingestion cycle.
    ///
    /// All changes of the cycle land in a single store update. A read failure
    /// on a fresh file leaves status and sensors untouched and is returned
    /// after the snapshot has been published.
    async fn run_cycle(&mut self) -> Result<TelemetrySnapshot> {
        let host = self.probe.sample().await;

        let path = &self.config.telem_file;
        let state = inspect_file(path, self.config.stale_after(), SystemTime::now()).await;

        let mut read_error = None;
        let fields = match state {
            FileState::Fresh { .. } => match tokio::fs::read(path).await {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(&bytes);
                    let selected = select_lines(&content);
                    trace!("selected lines: {selected:?}");
                    Some(selected.fields())
                }
                Err(e) => {
                    read_error = Some(
                        anyhow::Error::new(e)
                            .context(format!("failed to read {}", path.display())),
                    );
                    None
                }
            },
            _ => None,
        };

        let now = Utc::now();
        let (previous, snapshot) = self
            .store
            .update(|snapshot| {
                let previous = snapshot.status;
                snapshot.host = host;

                match (state, &fields) {
                    (FileState::Missing, _) => snapshot.classify(LinkStatus::NoFile, now),
                    (FileState::Stale { .. }, _) => snapshot.classify(LinkStatus::Stale, now),
                    (FileState::Fresh { .. }, Some(fields)) => {
                        snapshot.classify(LinkStatus::Live, now);
                        snapshot.merge(fields);
                    }
                    (FileState::Fresh { .. }, None) | (FileState::Unreadable, _) => {}
                }

                (previous, snapshot.clone())
            })
            .await;

        if previous != snapshot.status {
            match (snapshot.status, state) {
                (LinkStatus::Stale, FileState::Stale { age }) => {
                    warn!("telemetry is stale (last write {}s ago)", age.as_secs())
                }
                (LinkStatus::NoFile, _) => warn!("telemetry file not found"),
                (status, _) => info!("telemetry status {previous} -> {status}"),
            }
        }

        self.publish(&snapshot).await;

        match read_error {
            Some(e) => Err(e),
            None => Ok(snapshot),
        }
    }

    /// Hand the cycle's copy to the mirror and the relay.
    async fn publish(&self, snapshot: &TelemetrySnapshot) {
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.write(snapshot).await {
                warn!("failed to mirror snapshot: {e:#}");
            }
        }

        // a watch channel keeps the value even without receivers
        self.snapshot_tx.send_replace(snapshot.clone());
    }
}

/// Handle for controlling an IngestActor
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<IngestCommand>,
}

impl IngestHandle {
    /// Spawn a new ingest actor
    pub fn spawn(
        config: IngestConfig,
        store: SnapshotStore,
        probe: Box<dyn HostProbe>,
        mirror: Option<MirrorSink>,
        snapshot_tx: watch::Sender<TelemetrySnapshot>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = IngestActor::new(config, store, probe, mirror, snapshot_tx, cmd_rx);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a cycle immediately and return the snapshot it published
    pub async fn ingest_now(&self) -> Result<TelemetrySnapshot> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(IngestCommand::IngestNow { respond_to: tx })
            .await
            .context("failed to send IngestNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Gracefully shut down the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(IngestCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
