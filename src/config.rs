use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{trace, warn};

/// Bridge configuration.
///
/// Every section is optional; an empty JSON object yields the defaults.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            api: ApiSettings::default(),
            relay: RelayConfig::default(),
            mirror: MirrorConfig::default(),
            users_file: default_users_file(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IngestConfig {
    /// Telemetry log written by the simulator
    #[serde(default = "default_telem_file")]
    pub telem_file: PathBuf,

    #[serde(default = "default_ingest_interval")]
    pub interval_secs: u64,

    /// File age after which the link is reported stale
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

impl IngestConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            telem_file: default_telem_file(),
            interval_secs: default_ingest_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Static dashboard served next to the API
    pub dashboard_dir: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: true,
            dashboard_dir: None,
        }
    }
}

/// Cloud relay (GitHub Gist) settings
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RelayConfig {
    pub gist_id: Option<String>,

    /// Bearer credential; falls back to `token_files`
    pub token: Option<String>,

    #[serde(default = "default_token_files")]
    pub token_files: Vec<PathBuf>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the file inside the gist
    #[serde(default = "default_relay_file_name")]
    pub file_name: String,

    /// Minimum time between two pushes
    #[serde(default = "default_relay_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
}

impl RelayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the credential from the config value or the first readable,
    /// non-blank token file.
    pub fn credential(&self) -> Option<String> {
        if let Some(token) = non_blank(self.token.as_deref()) {
            return Some(token);
        }

        self.token_files.iter().find_map(|path| {
            if !path.is_file() {
                return None;
            }
            match std::fs::read_to_string(path) {
                Ok(content) => non_blank(Some(&content)),
                Err(e) => {
                    warn!("could not read token file {}: {e}", path.display());
                    None
                }
            }
        })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gist_id: None,
            token: None,
            token_files: default_token_files(),
            api_url: default_api_url(),
            file_name: default_relay_file_name(),
            interval_secs: default_relay_interval(),
            timeout_secs: default_relay_timeout(),
        }
    }
}

/// Local JSON copy of every published snapshot
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mirror_path")]
    pub path: PathBuf,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_mirror_path(),
        }
    }
}

const TELEM_FILE: &str = "TELEM_FILE";
const USERS_FILE: &str = "USERS_FILE";
const PORT: &str = "PORT";
const BIND_ADDR: &str = "BIND_ADDR";
const DASHBOARD_DIR: &str = "DASHBOARD_DIR";
const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const GIST_ID: &str = "GIST_ID";

impl Config {
    /// Override file values with environment variables.
    ///
    /// `lookup` is `std::env::var(..).ok()` in the binary.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(TELEM_FILE) {
            self.ingest.telem_file = PathBuf::from(path);
        }
        if let Some(path) = lookup(USERS_FILE) {
            self.users_file = PathBuf::from(path);
        }
        if let Some(addr) = lookup(BIND_ADDR) {
            match addr.parse() {
                Ok(addr) => self.api.bind_addr = addr,
                Err(e) => warn!("ignoring invalid {BIND_ADDR} '{addr}': {e}"),
            }
        }
        if let Some(port) = lookup(PORT) {
            match port.parse() {
                Ok(port) => self.api.bind_addr.set_port(port),
                Err(e) => warn!("ignoring invalid {PORT} '{port}': {e}"),
            }
        }
        if let Some(dir) = lookup(DASHBOARD_DIR) {
            self.api.dashboard_dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = non_blank(lookup(GITHUB_TOKEN).as_deref()) {
            self.relay.token = Some(token);
        }
        if let Some(gist_id) = non_blank(lookup(GIST_ID).as_deref()) {
            self.relay.gist_id = Some(gist_id);
        }

        trace!(
            "effective config: telem file {}, bind {}, relay {}",
            self.ingest.telem_file.display(),
            self.api.bind_addr,
            self.relay.gist_id.as_deref().unwrap_or("<none>")
        );
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

fn default_telem_file() -> PathBuf {
    PathBuf::from("telem.txt")
}

fn default_users_file() -> PathBuf {
    PathBuf::from("users.json")
}

fn default_ingest_interval() -> u64 {
    1
}

fn default_stale_after() -> u64 {
    120
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5050))
}

fn default_true() -> bool {
    true
}

fn default_token_files() -> Vec<PathBuf> {
    vec![PathBuf::from("GITHUB_TOKEN"), PathBuf::from("gist_token.txt")]
}

fn default_api_url() -> String {
    String::from("https://api.github.com")
}

fn default_relay_file_name() -> String {
    String::from("telemetry.json")
}

fn default_relay_interval() -> u64 {
    5
}

fn default_relay_timeout() -> u64 {
    10
}

fn default_mirror_path() -> PathBuf {
    PathBuf::from("telemetry.json")
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    serde_json::from_str::<Config>(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config from {path}: {:?}", config.ingest))
}
