//! Shared holder of the current telemetry snapshot
//!
//! The store is the only mutable state shared between the ingestion actor and
//! the HTTP handlers. Every access goes through one mutex held just long
//! enough to merge or to clone, never across file or network I/O, so a
//! reader always observes a whole cycle's result.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::TelemetrySnapshot;

/// Cloneable handle to the single in-memory snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<Mutex<TelemetrySnapshot>>,
}

impl SnapshotStore {
    /// Create a store holding the offline default snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a given snapshot
    pub fn with_snapshot(snapshot: TelemetrySnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Apply `mutator` under exclusive access and return its result.
    ///
    /// The mutator must not block; prepare parsed data before calling.
    pub async fn update<F, R>(&self, mutator: F) -> R
    where
        F: FnOnce(&mut TelemetrySnapshot) -> R,
    {
        let mut snapshot = self.inner.lock().await;
        mutator(&mut snapshot)
    }

    /// Independent copy of the current snapshot
    pub async fn read(&self) -> TelemetrySnapshot {
        self.inner.lock().await.clone()
    }
}
