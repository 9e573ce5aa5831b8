//! Wind kinematics: component/polar conversion and the log-law profile.
//!
//! Directions are meteorological: degrees the wind blows *from*, clockwise
//! from north, normalized to [0, 360).

use std::str::FromStr;

use crate::model::{AnalysisError, VON_KARMAN};

/// Sign convention relating (u, v) components to geographic azimuth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Sonic anemometer axes: azimuth = 90 − atan2(v, u).
    Sonic,
    /// Reanalysis / climate model components: azimuth = atan2(−u, −v).
    Climate,
}

impl FromStr for Convention {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sonic" => Ok(Convention::Sonic),
            "climate" => Ok(Convention::Climate),
            other => Err(AnalysisError::UnknownConvention(other.to_string())),
        }
    }
}

/// Direction, speed and elevation angle columns.
#[derive(Debug, Clone, PartialEq)]
pub struct WindPolar {
    pub direction: Vec<f64>,
    pub speed: Vec<f64>,
    pub elevation: Vec<f64>,
}

/// Wrap an angle in degrees into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid of a tiny negative rounds up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Azimuth the wind comes from, for a single (u, v) pair.
pub fn azimuth(u: f64, v: f64, convention: Convention) -> f64 {
    let raw = match convention {
        Convention::Sonic => 90.0 - v.atan2(u).to_degrees(),
        Convention::Climate => (-u).atan2(-v).to_degrees(),
    };
    normalize_degrees(raw)
}

/// Inverse of `azimuth`: components for a direction (from) and speed.
pub fn polar_to_components(direction: f64, speed: f64, convention: Convention) -> (f64, f64) {
    let rad = direction.to_radians();
    match convention {
        Convention::Sonic => (speed * rad.sin(), speed * rad.cos()),
        Convention::Climate => (-speed * rad.sin(), -speed * rad.cos()),
    }
}

/// Convert component columns to direction, speed and elevation angle.
///
/// Without a vertical component, or when it has no defined non-zero value
/// (all zero, all missing, or a mix of the two), speed is horizontal and
/// elevation is 0. Otherwise speed is the 3D magnitude and elevation is
/// atan(w / horizontal speed) in degrees; a fully calm row has elevation 0.
/// Missing inputs give missing outputs row by row.
pub fn wind_components_to_polar(
    u: &[f64],
    v: &[f64],
    w: Option<&[f64]>,
    convention: Convention,
) -> Result<WindPolar, AnalysisError> {
    check_len(u.len(), v.len())?;
    let w = match w {
        Some(w) => {
            check_len(u.len(), w.len())?;
            if w.iter().all(|x| *x == 0.0 || x.is_nan()) { None } else { Some(w) }
        }
        None => None,
    };

    let n = u.len();
    let mut polar = WindPolar {
        direction: Vec::with_capacity(n),
        speed: Vec::with_capacity(n),
        elevation: Vec::with_capacity(n),
    };

    for i in 0..n {
        let horizontal = u[i].hypot(v[i]);
        polar.direction.push(azimuth(u[i], v[i], convention));
        match w {
            Some(w) => {
                polar.speed.push((horizontal * horizontal + w[i] * w[i]).sqrt());
                let elevation = if horizontal == 0.0 && w[i] == 0.0 {
                    0.0
                } else {
                    (w[i] / horizontal).atan().to_degrees()
                };
                polar.elevation.push(elevation);
            }
            None => {
                polar.speed.push(horizontal);
                polar.elevation.push(if horizontal.is_nan() { f64::NAN } else { 0.0 });
            }
        }
    }
    Ok(polar)
}

/// Mean wind direction by vector averaging.
///
/// Rows where either component is missing are skipped; the mean (u, v) is
/// then converted once. Returns NaN when no complete row exists.
pub fn mean_wind_direction(u: &[f64], v: &[f64], convention: Convention) -> Result<f64, AnalysisError> {
    check_len(u.len(), v.len())?;
    let (mut su, mut sv, mut n) = (0.0, 0.0, 0usize);
    for (a, b) in u.iter().zip(v) {
        if a.is_nan() || b.is_nan() {
            continue;
        }
        su += a;
        sv += b;
        n += 1;
    }
    if n == 0 {
        return Ok(f64::NAN);
    }
    Ok(azimuth(su / n as f64, sv / n as f64, convention))
}

/// Friction velocity from one wind speed measured at height `z` over a
/// surface of roughness length `z0` (both in metres).
pub fn friction_velocity(speed: f64, z: f64, z0: f64) -> f64 {
    speed * VON_KARMAN / (z / z0).ln()
}

/// Wind speed at height `z` for friction velocity `ustar` and roughness `z0`.
pub fn speed_at_height(ustar: f64, z: f64, z0: f64) -> f64 {
    ustar / VON_KARMAN * (z / z0).ln()
}

fn check_len(expected: usize, found: usize) -> Result<(), AnalysisError> {
    if expected == found {
        Ok(())
    } else {
        Err(AnalysisError::LengthMismatch { expected, found })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
