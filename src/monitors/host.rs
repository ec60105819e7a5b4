use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{Components, System};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{instrument, trace, warn};

use crate::HostMetrics;

/// Source of per-cycle host metrics.
///
/// Sampling never fails; unavailable values are reported as 0.0.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn sample(&mut self) -> HostMetrics;
}

/// Host metrics from sysinfo and, on a Raspberry Pi, `vcgencmd`
pub struct SystemProbe {
    system: System,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // prime the counters so the first cycle reports a usage delta
        system.refresh_cpu_usage();
        Self { system }
    }

    /// CPU usage since the previous sample
    fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        f64::from(self.system.global_cpu_usage())
    }

    async fn board_temp(&self) -> f64 {
        if let Some(temp) = command_output(VCGENCMD, &["measure_temp"], COMMAND_TIMEOUT)
            .await
            .as_deref()
            .and_then(parse_vcgencmd_temp)
        {
            return temp;
        }
        component_temp().unwrap_or(0.0)
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostProbe for SystemProbe {
    #[instrument(skip_all)]
    async fn sample(&mut self) -> HostMetrics {
        let cpu_percent = self.cpu_percent();
        let board_temp = self.board_temp().await;
        trace!("host: cpu {cpu_percent:.1}%, board {board_temp:.1}°C");

        HostMetrics {
            cpu_percent,
            board_temp,
        }
    }
}

const VCGENCMD: &str = "vcgencmd";

/// Upper bound for one external query; the ingest cycle waits on it
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Stdout of a successful run of `program`, or `None` if it is missing,
/// fails, or does not finish within `limit`.
async fn command_output(program: &str, args: &[&str], limit: Duration) -> Option<String> {
    let run = Command::new(program).args(args).kill_on_drop(true).output();

    let output = match timeout(limit, run).await {
        Ok(result) => result.ok()?,
        Err(_) => {
            warn!("{program} did not answer within {}ms", limit.as_millis());
            return None;
        }
    };
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Average over all sensors reporting a temperature
fn component_temp() -> Option<f64> {
    let components = Components::new_with_refreshed_list();
    let temps: Vec<f32> = components
        .iter()
        .filter_map(|component| component.temperature())
        .filter(|temp| temp.is_finite())
        .collect();

    if temps.is_empty() {
        return None;
    }
    Some(f64::from(temps.iter().sum::<f32>()) / temps.len() as f64)
}

/// Parse `vcgencmd measure_temp` output, e.g. `temp=48.3'C`.
pub fn parse_vcgencmd_temp(output: &str) -> Option<f64> {
    output
        .trim()
        .strip_prefix("temp=")?
        .trim_end_matches("'C")
        .parse()
        .ok()
}
