pub mod actors;
pub mod api;
pub mod config;
pub mod mirror;
pub mod monitors;
pub mod parser;
pub mod relay;
pub mod store;
pub mod users;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::ParsedFields;

/// Liveness classification of the telemetry log, rewritten every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Log file present and recently modified
    Live,
    /// Log file present but not modified within the staleness threshold
    Stale,
    /// Log file does not exist
    NoFile,
    /// No ingestion cycle has completed yet
    #[default]
    Offline,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Live => "live",
            LinkStatus::Stale => "stale",
            LinkStatus::NoFile => "no_file",
            LinkStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Barometric sensor reading (MS5611)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureReading {
    pub temp: f64,
    pub pressure: f64,
    pub altitude: f64,
}

/// Gyro + accelerometer reading (MPU6050)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

/// Metrics of the ground station host itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    #[serde(rename = "cpu")]
    pub cpu_percent: f64,
    #[serde(rename = "gpu_temp")]
    pub board_temp: f64,
}

/// The single best-known telemetry state.
///
/// Field names on the wire follow the format the dashboard already consumes,
/// hence the sensor-part renames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub status: LinkStatus,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "ms5611")]
    pub pressure: PressureReading,
    #[serde(rename = "mpu6050")]
    pub imu: ImuReading,
    #[serde(rename = "tmp")]
    pub ambient_temp: f64,
    #[serde(rename = "system")]
    pub host: HostMetrics,
}

impl TelemetrySnapshot {
    /// Rewrite the per-cycle classification.
    pub fn classify(&mut self, status: LinkStatus, at: DateTime<Utc>) {
        self.status = status;
        self.timestamp = Some(at);
    }

    /// Merge every field group present in `fields`, leaving absent groups at
    /// their last-known values.
    pub fn merge(&mut self, fields: &ParsedFields) {
        if let Some(pressure) = fields.pressure {
            self.pressure = pressure;
        }
        if let Some(imu) = fields.imu {
            self.imu = imu;
        }
        if let Some(ambient_temp) = fields.ambient_temp {
            self.ambient_temp = ambient_temp;
        }
    }
}
