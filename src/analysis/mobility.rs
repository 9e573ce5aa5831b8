//! Dune mobility index: sediment flux relative to a soil-moisture proxy.
//!
//! Higher values mean more mobile sand, read as sparser vegetation cover.

use serde::Serialize;

use crate::analysis::aggregate::{aggregate_columns, Reducer, ResultantColumns};
use crate::logging::{self, Stage};
use crate::model::AnalysisError;
use crate::series::{Period, TimeSeries};

/// Per-period mobility of a run: resultant transport against mean soil
/// moisture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MobilitySummary {
    pub factor: String,
    pub keys: Vec<i32>,
    /// Resultant transport magnitude per period.
    pub transport: Vec<f64>,
    /// Mean soil moisture per period, missing values excluded.
    pub soil_moisture: Vec<f64>,
    pub index: Vec<f64>,
    pub anomaly: Vec<f64>,
}

/// `flux / soil_moisture` per period.
///
/// Missing inputs give a missing index. Zero moisture has no defined
/// ratio and is reported missing too rather than infinite.
pub fn mobility_index(flux: &[f64], soil_moisture: &[f64]) -> Result<Vec<f64>, AnalysisError> {
    if flux.len() != soil_moisture.len() {
        return Err(AnalysisError::LengthMismatch {
            expected: flux.len(),
            found: soil_moisture.len(),
        });
    }
    Ok(flux
        .iter()
        .zip(soil_moisture)
        .map(|(q, m)| {
            let ratio = q / m;
            if ratio.is_finite() { ratio } else { f64::NAN }
        })
        .collect())
}

/// Each value minus the mean of all values.
///
/// The mean is taken over every value with no exclusion, so a single gap
/// makes the whole anomaly series missing.
pub fn mobility_anomaly(index: &[f64]) -> Vec<f64> {
    if index.is_empty() {
        return Vec::new();
    }
    let mean = index.iter().sum::<f64>() / index.len() as f64;
    if mean.is_nan() {
        logging::warn(
            Stage::Mobility,
            None,
            "mean mobility undefined because of missing periods; anomaly is missing",
        );
    }
    index.iter().map(|v| v - mean).collect()
}

/// Mobility index and anomaly for every `period` in `series`.
///
/// Transport is the resultant magnitude over the `transport` bindings;
/// moisture is the period mean of the `soil_moisture` column.
pub fn mobility_by_period(
    series: &TimeSeries,
    period: Period,
    transport: &ResultantColumns,
    soil_moisture: &str,
) -> Result<MobilitySummary, AnalysisError> {
    let resultant = aggregate_columns(
        series,
        period,
        &[transport.flux.as_str(), transport.duration.as_str(), transport.azimuth.as_str()],
        &Reducer::Resultant(transport.clone()),
    )?;
    let moisture = aggregate_columns(series, period, &[soil_moisture], &Reducer::Mean)?;

    let magnitude_name = format!("{}_magnitude", transport.flux);
    let magnitude = resultant
        .column(&magnitude_name)
        .ok_or_else(|| AnalysisError::MissingColumn(magnitude_name.clone()))?
        .to_vec();
    let mean_moisture = moisture
        .column(soil_moisture)
        .ok_or_else(|| AnalysisError::MissingColumn(soil_moisture.to_string()))?
        .to_vec();

    let index = mobility_index(&magnitude, &mean_moisture)?;
    let anomaly = mobility_anomaly(&index);
    logging::info(
        Stage::Mobility,
        Some(soil_moisture),
        &format!("mobility index over {} period(s)", index.len()),
    );

    Ok(MobilitySummary {
        factor: resultant.factor,
        keys: resultant.keys,
        transport: magnitude,
        soil_moisture: mean_moisture,
        index,
        anomaly,
    })
}
