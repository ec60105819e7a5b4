//! Message types for actor communication
//!
//! Commands are sent to one actor over mpsc; request/response pairs carry a
//! oneshot sender. Snapshots themselves travel over a `watch` channel, which
//! always holds only the most recent copy.

use tokio::sync::oneshot;

use crate::TelemetrySnapshot;
use crate::relay::RelayOutcome;

/// Commands that can be sent to the IngestActor
#[derive(Debug)]
pub enum IngestCommand {
    /// Run one cycle now, bypassing the ticker
    IngestNow {
        /// Receives the snapshot published by that cycle
        respond_to: oneshot::Sender<anyhow::Result<TelemetrySnapshot>>,
    },

    /// Stop after the current cycle
    Shutdown,
}

/// Commands that can be sent to the RelayActor
#[derive(Debug)]
pub enum RelayCommand {
    GetStats {
        respond_to: oneshot::Sender<RelayStats>,
    },

    Shutdown,
}

/// Counters of relay outcomes since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Snapshots received from ingestion
    pub offered: u64,
    pub pushed: u64,
    pub failed: u64,
    pub throttled: u64,
    pub disabled: u64,
}

impl RelayStats {
    pub fn record(&mut self, outcome: RelayOutcome) {
        self.offered += 1;
        match outcome {
            RelayOutcome::Pushed => self.pushed += 1,
            RelayOutcome::Failed => self.failed += 1,
            RelayOutcome::Throttled => self.throttled += 1,
            RelayOutcome::Disabled => self.disabled += 1,
        }
    }
}
