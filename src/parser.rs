//! Tolerant parser for telemetry log lines
//!
//! A line is a loose sequence of whitespace/comma separated tokens. Sensor
//! readings start at a marker token and continue with a fixed number of
//! numeric tokens, e.g.
//!
//! ```text
//! BAT 4.50 0.0 MPU6050 0.1 0.2 0.3 0.01 0.02 9.81 GPS 43.1 -79.2 152.0 TMP 21.4 MS5611>
//! ```
//!
//! Markers may appear anywhere and in any order. Which markers exist and how
//! many values follow each is described by the `MARKERS` table; adding a sensor means
//! adding a table entry and a [`ParsedFields`] slot.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::{ImuReading, PressureReading};

/// Sea-level standard pressure, used when the pressure sensor reports no values
pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;

static TOKEN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("token separator regex is valid"));

/// Sensor markers recognized in a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    AmbientTemp,
    Gps,
    Pressure,
    Imu,
}

/// How a token is compared against a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenMatch {
    Exact,
    /// The producer sometimes decorates the token, e.g. `MS5611>`
    Prefix,
}

#[derive(Debug)]
struct MarkerSpec {
    marker: Marker,
    token: &'static str,
    matching: TokenMatch,
    fields: &'static [&'static str],
}

impl MarkerSpec {
    fn matches(&self, token: &str) -> bool {
        match self.matching {
            TokenMatch::Exact => token == self.token,
            TokenMatch::Prefix => token.starts_with(self.token),
        }
    }
}

/// Marker table, in evaluation order.
///
/// Temperature and GPS come first because the pressure fallback reads them.
static MARKERS: [MarkerSpec; 4] = [
    MarkerSpec {
        marker: Marker::AmbientTemp,
        token: "TMP",
        matching: TokenMatch::Exact,
        fields: &["temp"],
    },
    MarkerSpec {
        marker: Marker::Gps,
        token: "GPS",
        matching: TokenMatch::Exact,
        fields: &["lat", "lon", "alt"],
    },
    MarkerSpec {
        marker: Marker::Pressure,
        token: "MS5611",
        matching: TokenMatch::Prefix,
        fields: &["temp", "pressure", "altitude"],
    },
    MarkerSpec {
        marker: Marker::Imu,
        token: "MPU6050",
        matching: TokenMatch::Exact,
        fields: &["gx", "gy", "gz", "ax", "ay", "az"],
    },
];

impl Marker {
    fn spec(self) -> &'static MarkerSpec {
        // every variant has exactly one table entry
        match self {
            Marker::AmbientTemp => &MARKERS[0],
            Marker::Gps => &MARKERS[1],
            Marker::Pressure => &MARKERS[2],
            Marker::Imu => &MARKERS[3],
        }
    }

    /// Marker text as it appears in the log
    pub fn token(self) -> &'static str {
        self.spec().token
    }

    /// Number of numeric tokens following the marker
    pub fn arity(self) -> usize {
        self.spec().fields.len()
    }
}

/// Latitude, longitude and altitude from the GPS marker
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Field groups found on a single line; `None` means "not on this line".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedFields {
    pub ambient_temp: Option<f64>,
    pub gps: Option<GpsFix>,
    pub pressure: Option<PressureReading>,
    pub imu: Option<ImuReading>,
}

impl ParsedFields {
    pub fn is_empty(&self) -> bool {
        self.ambient_temp.is_none()
            && self.gps.is_none()
            && self.pressure.is_none()
            && self.imu.is_none()
    }

    fn set(&mut self, marker: Marker, values: &[f64]) {
        match marker {
            Marker::AmbientTemp => self.ambient_temp = Some(values[0]),
            Marker::Gps => {
                self.gps = Some(GpsFix {
                    lat: values[0],
                    lon: values[1],
                    alt: values[2],
                })
            }
            Marker::Pressure => {
                self.pressure = Some(PressureReading {
                    temp: values[0],
                    pressure: values[1],
                    altitude: values[2],
                })
            }
            Marker::Imu => {
                self.imu = Some(ImuReading {
                    gx: values[0],
                    gy: values[1],
                    gz: values[2],
                    ax: values[3],
                    ay: values[4],
                    az: values[5],
                })
            }
        }
    }

    /// Pressure reading for a bare pressure marker, assembled from whatever
    /// the same line already provided.
    fn pressure_fallback(&self) -> PressureReading {
        PressureReading {
            temp: self.ambient_temp.unwrap_or(0.0),
            pressure: STANDARD_PRESSURE_HPA,
            altitude: self.gps.map(|fix| fix.alt).unwrap_or(0.0),
        }
    }
}

/// Outcome of reading the values after a marker
#[derive(Debug, PartialEq)]
enum Extraction {
    Values(Vec<f64>),
    /// Marker is the last token of the line
    Bare,
    /// Fewer numeric tokens than the marker needs
    Incomplete(usize),
}

fn extract(trailing: &[&str], arity: usize) -> Extraction {
    if trailing.is_empty() {
        return Extraction::Bare;
    }

    let values: Vec<f64> = trailing
        .iter()
        .take(arity)
        .map_while(|token| token.parse::<f64>().ok())
        .collect();

    match values.len() {
        n if n == arity => Extraction::Values(values),
        n => Extraction::Incomplete(n),
    }
}

/// Split a line into tokens on runs of whitespace and commas.
pub fn tokenize(line: &str) -> Vec<&str> {
    TOKEN_SEPARATOR
        .split(line.trim())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse one log line into the field groups it contains.
///
/// Never fails: markers with missing or malformed values are omitted, except a
/// pressure marker ending the line, which yields a reading built from the
/// line's own temperature, the standard pressure and the GPS altitude.
pub fn parse_line(line: &str) -> ParsedFields {
    let tokens = tokenize(line);
    let mut fields = ParsedFields::default();

    for spec in &MARKERS {
        let Some(idx) = tokens.iter().position(|token| spec.matches(token)) else {
            continue;
        };

        match extract(&tokens[idx + 1..], spec.fields.len()) {
            Extraction::Values(values) => fields.set(spec.marker, &values),
            Extraction::Bare if spec.marker == Marker::Pressure => {
                fields.pressure = Some(fields.pressure_fallback());
            }
            Extraction::Bare => {
                trace!("{} has no values, skipping", spec.token);
            }
            Extraction::Incomplete(found) => {
                trace!(
                    "{} needs {} values ({}), found {found}, skipping",
                    spec.token,
                    spec.fields.len(),
                    spec.fields.join(", ")
                );
            }
        }
    }

    fields
}
