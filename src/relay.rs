//! Cloud relay of the snapshot to a GitHub Gist
//!
//! Ingestion produces a snapshot every second; the relay forwards at most one
//! per configured interval. A failed push is not retried: the next window
//! simply pushes fresher data.
//!
//! ```text
//! snapshot ─► RateLimiter ─► PATCH /gists/{id} (full file content, bearer auth)
//! ```

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, instrument, trace};

use crate::TelemetrySnapshot;
use crate::config::RelayConfig;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Longest slice of an error response body kept for logging
const MAX_ERROR_BODY: usize = 400;

/// Result of offering a snapshot to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// No destination or credential configured
    Disabled,
    /// Last push is more recent than the interval
    Throttled,
    Pushed,
    Failed,
}

/// Allows one event per interval.
///
/// The window starts at the accepted event, whatever its outcome.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

#[derive(Debug, Serialize)]
struct GistUpdate<'a> {
    files: HashMap<&'a str, GistFile>,
}

#[derive(Debug, Serialize)]
struct GistFile {
    content: String,
}

#[derive(Debug, Clone)]
struct RelayTarget {
    url: String,
    authorization: String,
    file_name: String,
}

/// `Bearer <token>` unless the credential already names its scheme
pub fn authorization_header(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("Bearer ") || token.starts_with("token ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

pub struct RelayPublisher {
    client: reqwest::Client,
    target: Option<RelayTarget>,
    limiter: RateLimiter,
}

impl RelayPublisher {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        let gist_id = config
            .gist_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let target = match (gist_id, config.credential()) {
            (Some(gist_id), Some(token)) => Some(RelayTarget {
                url: format!("{}/gists/{gist_id}", config.api_url.trim_end_matches('/')),
                authorization: authorization_header(&token),
                file_name: config.file_name.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            client,
            target,
            limiter: RateLimiter::new(config.interval()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Destination URL, if the relay is enabled
    pub fn destination(&self) -> Option<&str> {
        self.target.as_ref().map(|target| target.url.as_str())
    }

    /// Offer the latest snapshot; pushes only if the interval has elapsed.
    pub async fn offer(&mut self, snapshot: &TelemetrySnapshot) -> RelayOutcome {
        self.offer_at(snapshot, Instant::now()).await
    }

    pub async fn offer_at(&mut self, snapshot: &TelemetrySnapshot, now: Instant) -> RelayOutcome {
        if self.target.is_none() {
            return RelayOutcome::Disabled;
        }

        if !self.limiter.try_acquire(now) {
            trace!("relay throttled");
            return RelayOutcome::Throttled;
        }

        match self.push(snapshot).await {
            Ok(()) => RelayOutcome::Pushed,
            Err(e) => {
                error!("relay push failed: {e:#}");
                RelayOutcome::Failed
            }
        }
    }

    /// Replace the gist file with `snapshot`, bypassing the rate limit.
    #[instrument(skip_all)]
    pub async fn push(&self, snapshot: &TelemetrySnapshot) -> Result<()> {
        let Some(target) = &self.target else {
            bail!("relay has no destination configured");
        };

        let content =
            serde_json::to_string_pretty(snapshot).context("failed to encode snapshot")?;
        let update = GistUpdate {
            files: HashMap::from([(target.file_name.as_str(), GistFile { content })]),
        };

        let response = self
            .client
            .patch(&target.url)
            .header(reqwest::header::AUTHORIZATION, &target.authorization)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&update)
            .send()
            .await
            .context("failed to send relay request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            bail!("HTTP {status}: {body}");
        }

        debug!("pushed snapshot ({}) to relay", snapshot.status);
        Ok(())
    }
}
