//! API shared state

use crate::store::SnapshotStore;
use crate::users::UserDirectory;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Snapshot written by the ingest actor
    pub store: SnapshotStore,

    /// Dashboard accounts
    pub users: UserDirectory,
}

impl ApiState {
    pub fn new(store: SnapshotStore, users: UserDirectory) -> Self {
        Self { store, users }
    }
}
