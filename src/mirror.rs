//! Local JSON mirror of the published snapshot
//!
//! Purely observational: the bridge never reads the mirror back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::trace;

use crate::TelemetrySnapshot;

#[derive(Debug, Clone)]
pub struct MirrorSink {
    path: PathBuf,
}

impl MirrorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the mirror file with `snapshot`.
    ///
    /// Writes a sibling temp file and renames it over the target, so readers
    /// see either the previous or the new content.
    pub async fn write(&self, snapshot: &TelemetrySnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot).context("failed to encode snapshot")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        trace!("mirrored snapshot to {}", self.path.display());
        Ok(())
    }
}
