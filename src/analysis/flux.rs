//! Threshold velocity, sediment flux, vector resultants and air density.
//!
//! Model selection goes through `methods::ThresholdRegistry` and
//! `methods::FluxRegistry`; this module only broadcasts inputs and applies
//! the missing-data policy of each operation.

use crate::analysis::methods::{FluxParams, FluxRegistry, ThresholdParams, ThresholdRegistry};
use crate::analysis::wind::normalize_degrees;
use crate::logging::{self, Stage};
use crate::model::{AnalysisError, Diagnostic, ResultantVector, KELVIN_SANITY_FLOOR, R_AIR};
use crate::series::{interpolate_gaps, TimeSeries};

/// Threshold friction velocity from the named model.
pub fn threshold_velocity(
    registry: &ThresholdRegistry,
    method: &str,
    params: &ThresholdParams,
) -> Result<f64, AnalysisError> {
    let model = registry.get(method)?;
    Ok((model.compute)(params))
}

/// Inputs to `sediment_flux`. Each slice is either one value, broadcast to
/// every sample, or one value per sample.
#[derive(Debug, Clone, Copy)]
pub struct FluxInputs<'a> {
    pub friction_velocity: &'a [f64],
    pub threshold_velocity: &'a [f64],
    pub air_density: &'a [f64],
    pub force_threshold: bool,
}

/// Sediment flux per sample from the named model.
///
/// Missing inputs yield missing flux for that sample only.
pub fn sediment_flux(
    registry: &FluxRegistry,
    method: &str,
    inputs: &FluxInputs<'_>,
) -> Result<Vec<f64>, AnalysisError> {
    let model = registry.get(method)?;
    let n = [inputs.friction_velocity, inputs.threshold_velocity, inputs.air_density]
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(0);
    for slice in [inputs.friction_velocity, inputs.threshold_velocity, inputs.air_density] {
        if slice.len() != 1 && slice.len() != n {
            return Err(AnalysisError::LengthMismatch {
                expected: n,
                found: slice.len(),
            });
        }
    }

    let at = |s: &[f64], i: usize| if s.len() == 1 { s[0] } else { s[i] };
    Ok((0..n)
        .map(|i| {
            (model.compute)(&FluxParams {
                friction_velocity: at(inputs.friction_velocity, i),
                threshold_velocity: at(inputs.threshold_velocity, i),
                air_density: at(inputs.air_density, i),
                force_threshold: inputs.force_threshold,
            })
        })
        .collect())
}

/// Net transport vector of flux × duration contributions.
///
/// `azimuth` is the direction the wind comes from, in degrees. Each record
/// contributes u = −sin(az)·q·dt and v = −cos(az)·q·dt; the sums are
/// converted back with the same convention, so constant direction returns
/// that direction and the scalar sum of q·dt.
///
/// Any missing value anywhere in the inputs makes the whole result missing.
/// Partial sums over gappy records are not reported. Empty input is also
/// missing.
pub fn resultant_vector(
    flux: &[f64],
    duration: &[f64],
    azimuth: &[f64],
) -> Result<ResultantVector, AnalysisError> {
    for len in [duration.len(), azimuth.len()] {
        if len != flux.len() {
            return Err(AnalysisError::LengthMismatch {
                expected: flux.len(),
                found: len,
            });
        }
    }
    if flux.is_empty() {
        return Ok(ResultantVector::missing());
    }

    let (mut u, mut v) = (0.0, 0.0);
    for ((q, dt), az) in flux.iter().zip(duration).zip(azimuth) {
        let amount = q * dt;
        let rad = az.to_radians();
        u += -rad.sin() * amount;
        v += -rad.cos() * amount;
    }
    if u.is_nan() || v.is_nan() {
        return Ok(ResultantVector::missing());
    }

    Ok(ResultantVector {
        azimuth: normalize_degrees((-u).atan2(-v).to_degrees()),
        magnitude: u.hypot(v),
    })
}

/// Ideal-gas air density, kg/m³, from pressure (Pa) and temperature (K).
pub fn air_density(pressure: f64, temperature: f64) -> f64 {
    pressure / (R_AIR * temperature)
}

/// Air density column with its diagnostics.
#[derive(Debug, Clone)]
pub struct DensityResult {
    pub density: Vec<f64>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Air density for every row of `series`.
///
/// When `interpolate` is set and temperature has fewer defined values than
/// pressure, temperature gaps are linearly interpolated in time first. If
/// that leaves the final row undefined, the last known temperature is
/// carried forward by exactly that one row. Temperatures below 200 raise a
/// `CelsiusSuspected` diagnostic but are still used.
pub fn air_density_series(
    series: &TimeSeries,
    pressure_column: &str,
    temperature_column: &str,
    interpolate: bool,
) -> Result<DensityResult, AnalysisError> {
    let pressure = series.column(pressure_column)?;
    let raw_temperature = series.column(temperature_column)?;
    let mut diagnostics = Vec::new();

    let defined = |s: &[f64]| s.iter().filter(|x| !x.is_nan()).count();
    let temperature = if interpolate && defined(raw_temperature) < defined(pressure) {
        let mut filled = interpolate_gaps(&series.epoch_seconds(), raw_temperature);
        let n = filled.len();
        if n >= 2 && filled[n - 1].is_nan() && !filled[n - 2].is_nan() {
            filled[n - 1] = filled[n - 2];
            diagnostics.push(Diagnostic::TrailingGapFilled {
                column: temperature_column.to_string(),
            });
        }
        filled
    } else {
        raw_temperature.to_vec()
    };

    let min_temperature = temperature
        .iter()
        .copied()
        .filter(|t| !t.is_nan())
        .fold(f64::INFINITY, f64::min);
    if min_temperature < KELVIN_SANITY_FLOOR {
        diagnostics.push(Diagnostic::CelsiusSuspected { min_temperature });
    }

    for d in &diagnostics {
        logging::log_diagnostic(d);
    }
    logging::debug(
        Stage::Flux,
        Some(temperature_column),
        &format!("air density computed for {} row(s)", temperature.len()),
    );

    let density = pressure
        .iter()
        .zip(&temperature)
        .map(|(p, t)| air_density(*p, *t))
        .collect();
    Ok(DensityResult { density, diagnostics })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
