/// Core data types for the aeolian transport toolkit.
///
/// This module defines the shared domain model imported by all other modules:
/// raw flat-file records, column provenance, resultant vectors, the crate
/// error type and the non-fatal diagnostics that ride alongside results.
/// It contains no I/O.
///
/// Missing values are stored as `f64::NAN` everywhere. Whether an operation
/// excludes them or propagates them is documented on the operation itself.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

/// von Kármán constant used by the logarithmic wind profile.
pub const VON_KARMAN: f64 = 0.41;

/// Gravitational acceleration, m/s².
pub const GRAVITY: f64 = 9.81;

/// Specific gas constant for dry air, J/(kg·K).
pub const R_AIR: f64 = 287.058;

/// Bulk density of deposited sand, kg/m³. Converts mass flux to volume flux.
pub const BULK_DENSITY: f64 = 1500.0;

/// Temperatures below this are assumed to have been supplied in Celsius.
pub const KELVIN_SANITY_FLOOR: f64 = 200.0;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// A single row of a gridded-forecast or anemometer flat file.
///
/// `reference_time` and `valid_time` are expected to agree. When they do
/// not, the parser keeps the reference time as an auxiliary column and
/// reports a `Diagnostic::TimeDisagreement`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub parameter: String,
    pub unit: String,
    pub reference_time: DateTime<Utc>,
    pub valid_time: DateTime<Utc>,
    pub value: f64, // NaN when the file carried NA / blank
}

/// Provenance of one ingested parameter: its name and unit as read from file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    pub parameter: String,
    pub unit: String,
}

impl ColumnMeta {
    pub fn new(parameter: &str, unit: &str) -> Self {
        ColumnMeta {
            parameter: parameter.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// Net transport over a window: azimuth in degrees within [0, 360) and a
/// non-negative magnitude. Both fields are NaN when any input was missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultantVector {
    pub azimuth: f64,
    pub magnitude: f64,
}

impl ResultantVector {
    pub fn missing() -> Self {
        ResultantVector {
            azimuth: f64::NAN,
            magnitude: f64::NAN,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.azimuth.is_nan() || self.magnitude.is_nan()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal conditions. These abort the current call and are surfaced to the
/// caller; nothing in the crate swallows them.
#[derive(Debug, PartialEq)]
pub enum AnalysisError {
    /// A timestamp did not match `YYYYMMDDHHMM`.
    TimeFormat { value: String },
    /// A value field was neither numeric nor a missing marker.
    ValueFormat { value: String },
    /// Wind convention token other than `sonic` / `climate`.
    UnknownConvention(String),
    /// No threshold or flux model is registered under this name.
    UnknownMethod { kind: &'static str, name: String },
    /// Aggregation selector other than mean / quantiles / sum / resultant.
    UnknownAggregation(String),
    /// Calendar period selector other than year / month.
    UnknownPeriod(String),
    /// A named column does not exist in the series.
    MissingColumn(String),
    /// Parallel inputs of unequal length.
    LengthMismatch { expected: usize, found: usize },
    /// Timestamps handed to a series constructor were not strictly increasing.
    UnorderedTimestamps { index: usize },
    Io(String),
    Csv(String),
    Config(String),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::TimeFormat { value } => {
                write!(f, "Time format error: '{}' is not YYYYMMDDHHMM", value)
            }
            AnalysisError::ValueFormat { value } => {
                write!(f, "Value format error: '{}' is not numeric", value)
            }
            AnalysisError::UnknownConvention(name) => {
                write!(f, "Unknown wind convention: {} (expected sonic or climate)", name)
            }
            AnalysisError::UnknownMethod { kind, name } => {
                write!(f, "Unknown {} method: {}", kind, name)
            }
            AnalysisError::UnknownAggregation(name) => {
                write!(f, "Unknown aggregation: {} (expected mean, quantiles, sum or resultant)", name)
            }
            AnalysisError::UnknownPeriod(name) => {
                write!(f, "Unknown period: {} (expected year or month)", name)
            }
            AnalysisError::MissingColumn(name) => write!(f, "Column not found: {}", name),
            AnalysisError::LengthMismatch { expected, found } => {
                write!(f, "Length mismatch: expected {} values, found {}", expected, found)
            }
            AnalysisError::UnorderedTimestamps { index } => {
                write!(f, "Timestamps not strictly increasing at index {}", index)
            }
            AnalysisError::Io(msg) => write!(f, "I/O error: {}", msg),
            AnalysisError::Csv(msg) => write!(f, "CSV error: {}", msg),
            AnalysisError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::Io(err.to_string())
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        AnalysisError::Csv(err.to_string())
    }
}

impl From<toml::de::Error> for AnalysisError {
    fn from(err: toml::de::Error) -> Self {
        AnalysisError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Io(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Non-fatal conditions, returned next to a still-valid result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    /// Reference time and valid time disagreed on `rows` rows of `parameter`.
    TimeDisagreement { parameter: String, rows: usize },
    /// The smallest temperature seen looks like Celsius rather than Kelvin.
    CelsiusSuspected { min_temperature: f64 },
    /// A trailing gap in `column` was closed by repeating the last value once.
    TrailingGapFilled { column: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::TimeDisagreement { parameter, rows } => write!(
                f,
                "reference and valid time disagree on {} row(s) of {}",
                rows, parameter
            ),
            Diagnostic::CelsiusSuspected { min_temperature } => write!(
                f,
                "temperature minimum {:.1} is below {}; input may be Celsius",
                min_temperature, KELVIN_SANITY_FLOOR
            ),
            Diagnostic::TrailingGapFilled { column } => {
                write!(f, "trailing gap in {} filled by repeating last value", column)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
