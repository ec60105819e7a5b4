//! Background actors of the bridge
//!
//! ```text
//!   telem.txt ──► IngestActor ──► SnapshotStore ◄── HTTP handlers
//!                     │
//!                     ├──► MirrorSink (telemetry.json)
//!                     │
//!                     └──► watch channel ──► RelayActor ──► Gist
//! ```
//!
//! - **IngestActor**: classifies the log file, parses the newest sensor lines
//!   and merges them into the store once per tick
//! - **RelayActor**: forwards the newest snapshot to the cloud, rate limited
//!
//! Each actor owns an mpsc command channel and is driven through a cloneable
//! handle, the same shape for both.

pub mod ingest;
pub mod messages;
pub mod relay;
