//! Probes for the ground station host

pub mod host;

pub use host::{HostProbe, SystemProbe};
