//! Calendar-period summaries.
//!
//! Rows are grouped by an integer factor (year or month) and each group is
//! reduced column by column. `mean`, `sum` and `quantiles` exclude missing
//! values; `resultant` propagates them (see `flux::resultant_vector`).
//! Every factor level present in the input yields one row, sorted
//! ascending; a group with nothing to reduce reports NaN, never a skipped
//! row.

use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

use serde::Serialize;

use crate::analysis::flux::resultant_vector;
use crate::analysis::wind::{mean_wind_direction, Convention};
use crate::logging::{self, Stage};
use crate::model::AnalysisError;
use crate::series::{Period, TimeSeries};

/// Probabilities reported by the `quantiles` reducer.
pub const QUANTILE_PROBS: [f64; 5] = [0.10, 0.25, 0.50, 0.75, 0.90];

// ---------------------------------------------------------------------------
// Reducers
// ---------------------------------------------------------------------------

/// Column bindings for the `resultant` reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultantColumns {
    pub flux: String,
    pub duration: String,
    pub azimuth: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reducer {
    Mean,
    Quantiles,
    Sum,
    Resultant(ResultantColumns),
}

impl Reducer {
    /// Build a reducer from its selector token. `resultant` needs bindings.
    pub fn from_selector(token: &str, bindings: Option<ResultantColumns>) -> Result<Self, AnalysisError> {
        match AggregationKind::from_str(token)? {
            AggregationKind::Mean => Ok(Reducer::Mean),
            AggregationKind::Quantiles => Ok(Reducer::Quantiles),
            AggregationKind::Sum => Ok(Reducer::Sum),
            AggregationKind::Resultant => bindings.map(Reducer::Resultant).ok_or_else(|| {
                AnalysisError::Config(
                    "resultant aggregation requires flux, duration and azimuth columns".to_string(),
                )
            }),
        }
    }
}

/// Selector tokens without their bindings; what a config file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Mean,
    Quantiles,
    Sum,
    Resultant,
}

impl FromStr for AggregationKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mean" => Ok(AggregationKind::Mean),
            "quantiles" => Ok(AggregationKind::Quantiles),
            "sum" => Ok(AggregationKind::Sum),
            "resultant" => Ok(AggregationKind::Resultant),
            other => Err(AnalysisError::UnknownAggregation(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// One row per period key, one or more statistics per source column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// What the keys are: `year`, `month`, or a caller-chosen label.
    pub factor: String,
    pub keys: Vec<i32>,
    pub columns: Vec<SummaryColumn>,
}

impl Summary {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Appends a statistic computed outside the reducers, one value per key.
    pub fn push_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), AnalysisError> {
        if values.len() != self.keys.len() {
            return Err(AnalysisError::LengthMismatch {
                expected: self.keys.len(),
                found: values.len(),
            });
        }
        self.columns.push(SummaryColumn { name: name.to_string(), values });
        Ok(())
    }

    /// Pretty JSON; missing values serialize as `null`.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// CSV with a header row; missing values are written as `NA`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), AnalysisError> {
        let mut out = csv::Writer::from_writer(writer);

        let mut header = vec![self.factor.clone()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        out.write_record(&header)?;

        for (row, key) in self.keys.iter().enumerate() {
            let mut record = vec![key.to_string()];
            for col in &self.columns {
                let v = col.values[row];
                record.push(if v.is_nan() { "NA".to_string() } else { v.to_string() });
            }
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Summarize every column of `series` by calendar `period`.
pub fn aggregate(series: &TimeSeries, period: Period, reducer: &Reducer) -> Result<Summary, AnalysisError> {
    aggregate_columns(series, period, &series.column_names(), reducer)
}

/// Summarize only the named columns of `series` by calendar `period`.
pub fn aggregate_columns(
    series: &TimeSeries,
    period: Period,
    names: &[&str],
    reducer: &Reducer,
) -> Result<Summary, AnalysisError> {
    let factor = series.calendar_factor(period);
    let mut columns = Vec::with_capacity(names.len());
    for &name in names {
        columns.push((name, series.column(name)?));
    }
    aggregate_by(period.label(), &factor, &columns, reducer)
}

/// Mean wind direction per factor level, vector-averaged from the `u` and
/// `v` rows of each group. Levels come out in the same ascending order as
/// `aggregate_by` keys.
pub fn mean_direction_by(
    factor: &[i32],
    u: &[f64],
    v: &[f64],
    convention: Convention,
) -> Result<Vec<f64>, AnalysisError> {
    for len in [u.len(), v.len()] {
        if len != factor.len() {
            return Err(AnalysisError::LengthMismatch { expected: factor.len(), found: len });
        }
    }
    group_rows(factor)
        .values()
        .map(|rows| {
            let gu: Vec<f64> = rows.iter().map(|&r| u[r]).collect();
            let gv: Vec<f64> = rows.iter().map(|&r| v[r]).collect();
            mean_wind_direction(&gu, &gv, convention)
        })
        .collect()
}

fn group_rows(factor: &[i32]) -> BTreeMap<i32, Vec<usize>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (row, key) in factor.iter().enumerate() {
        groups.entry(*key).or_default().push(row);
    }
    groups
}

/// Summarize arbitrary parallel columns grouped by a caller-supplied factor.
pub fn aggregate_by(
    factor_label: &str,
    factor: &[i32],
    columns: &[(&str, &[f64])],
    reducer: &Reducer,
) -> Result<Summary, AnalysisError> {
    for &(_, values) in columns {
        if values.len() != factor.len() {
            return Err(AnalysisError::LengthMismatch {
                expected: factor.len(),
                found: values.len(),
            });
        }
    }

    let groups = group_rows(factor);
    let keys: Vec<i32> = groups.keys().copied().collect();

    let gather = |values: &[f64], rows: &[usize]| -> Vec<f64> { rows.iter().map(|&r| values[r]).collect() };

    let mut out = Vec::new();
    match reducer {
        Reducer::Mean | Reducer::Sum => {
            for &(name, values) in columns {
                let stat: Vec<f64> = groups
                    .values()
                    .map(|rows| {
                        let g = gather(values, rows);
                        if *reducer == Reducer::Mean { mean_excluding(&g) } else { sum_excluding(&g) }
                    })
                    .collect();
                out.push(SummaryColumn { name: name.to_string(), values: stat });
            }
        }
        Reducer::Quantiles => {
            for &(name, values) in columns {
                let per_group: Vec<Vec<f64>> = groups
                    .values()
                    .map(|rows| quantiles_excluding(&gather(values, rows), &QUANTILE_PROBS))
                    .collect();
                for (k, p) in QUANTILE_PROBS.iter().enumerate() {
                    out.push(SummaryColumn {
                        name: format!("{}_p{:02}", name, (p * 100.0).round() as u32),
                        values: per_group.iter().map(|q| q[k]).collect(),
                    });
                }
            }
        }
        Reducer::Resultant(bind) => {
            let lookup = |wanted: &str| {
                columns
                    .iter()
                    .find(|(name, _)| *name == wanted)
                    .map(|(_, values)| *values)
                    .ok_or_else(|| AnalysisError::MissingColumn(wanted.to_string()))
            };
            let flux = lookup(&bind.flux)?;
            let duration = lookup(&bind.duration)?;
            let azimuth = lookup(&bind.azimuth)?;

            let mut az = Vec::with_capacity(keys.len());
            let mut mag = Vec::with_capacity(keys.len());
            for rows in groups.values() {
                let r = resultant_vector(&gather(flux, rows), &gather(duration, rows), &gather(azimuth, rows))?;
                az.push(r.azimuth);
                mag.push(r.magnitude);
            }
            out.push(SummaryColumn { name: format!("{}_azimuth", bind.flux), values: az });
            out.push(SummaryColumn { name: format!("{}_magnitude", bind.flux), values: mag });
        }
    }

    let missing = out.iter().flat_map(|c| &c.values).filter(|v| v.is_nan()).count();
    if missing > 0 {
        logging::debug(
            Stage::Aggregate,
            None,
            &format!("{} statistic(s) undefined across {} period(s)", missing, keys.len()),
        );
    }

    Ok(Summary {
        factor: factor_label.to_string(),
        keys,
        columns: out,
    })
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

fn defined(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Arithmetic mean of the defined values; NaN when there are none.
pub fn mean_excluding(values: &[f64]) -> f64 {
    let d = defined(values);
    if d.is_empty() {
        f64::NAN
    } else {
        d.iter().sum::<f64>() / d.len() as f64
    }
}

/// Sum of the defined values; NaN when there are none.
pub fn sum_excluding(values: &[f64]) -> f64 {
    let d = defined(values);
    if d.is_empty() { f64::NAN } else { d.iter().sum() }
}

/// Sample quantiles by linear interpolation between order statistics
/// (Hyndman & Fan type 7), missing values excluded.
pub fn quantiles_excluding(values: &[f64], probs: &[f64]) -> Vec<f64> {
    let mut d = defined(values);
    if d.is_empty() {
        return vec![f64::NAN; probs.len()];
    }
    d.sort_by(f64::total_cmp);
    let last = (d.len() - 1) as f64;
    probs
        .iter()
        .map(|p| {
            let h = last * p;
            let lo = h.floor() as usize;
            let hi = h.ceil() as usize;
            d[lo] + (h - lo as f64) * (d[hi] - d[lo])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> ResultantColumns {
        ResultantColumns {
            flux: "q".to_string(),
            duration: "dt".to_string(),
            azimuth: "dir".to_string(),
        }
    }

    #[test]
    fn test_mean_and_sum_exclude_missing_per_value() {
        let factor = [2020, 2020, 2021, 2021];
        let x = [1.0, f64::NAN, 2.0, 4.0];
        let mean = aggregate_by("year", &factor, &[("x", &x[..])], &Reducer::Mean).unwrap();
        assert_eq!(mean.keys, vec![2020, 2021]);
        assert_eq!(mean.column("x").unwrap(), &[1.0, 3.0]);

        let sum = aggregate_by("year", &factor, &[("x", &x[..])], &Reducer::Sum).unwrap();
        assert_eq!(sum.column("x").unwrap(), &[1.0, 6.0]);
    }

    #[test]
    fn test_all_missing_group_is_reported_not_skipped() {
        let factor = [1, 2];
        let x = [f64::NAN, 5.0];
        let s = aggregate_by("month", &factor, &[("x", &x[..])], &Reducer::Sum).unwrap();
        assert_eq!(s.len(), 2, "degenerate period keeps its row");
        assert!(s.column("x").unwrap()[0].is_nan());
    }

    #[test]
    fn test_keys_sorted_ascending() {
        let factor = [12, 3, 7, 3];
        let x = [1.0, 2.0, 3.0, 4.0];
        let s = aggregate_by("month", &factor, &[("x", &x[..])], &Reducer::Mean).unwrap();
        assert_eq!(s.keys, vec![3, 7, 12]);
        assert_eq!(s.column("x").unwrap(), &[3.0, 3.0, 1.0]);
    }

    #[test]
    fn test_quantiles_produce_one_column_per_probability() {
        let factor = [1; 11];
        let x: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let s = aggregate_by("year", &factor, &[("x", &x[..])], &Reducer::Quantiles).unwrap();
        assert_eq!(s.column_names(), vec!["x_p10", "x_p25", "x_p50", "x_p75", "x_p90"]);
        assert_eq!(s.column("x_p10").unwrap(), &[1.0]);
        assert_eq!(s.column("x_p25").unwrap(), &[2.5]);
        assert_eq!(s.column("x_p50").unwrap(), &[5.0]);
    }

    #[test]
    fn test_resultant_propagates_missing_within_group() {
        let factor = [2020, 2020, 2021, 2021];
        let q = [1.0, f64::NAN, 1.0, 1.0];
        let dt = [10.0; 4];
        let dir = [90.0; 4];
        let s = aggregate_by(
            "year",
            &factor,
            &[("q", &q[..]), ("dt", &dt[..]), ("dir", &dir[..])],
            &Reducer::Resultant(bindings()),
        )
        .unwrap();

        let mag = s.column("q_magnitude").unwrap();
        let az = s.column("q_azimuth").unwrap();
        assert!(mag[0].is_nan() && az[0].is_nan(), "one missing record voids the period");
        assert!((mag[1] - 20.0).abs() < 1e-9);
        assert!((az[1] - 90.0).abs() < 1e-9);

        // the same gap is merely skipped by sum
        let sum = aggregate_by("year", &factor, &[("q", &q[..])], &Reducer::Sum).unwrap();
        assert_eq!(sum.column("q").unwrap()[0], 1.0);
    }

    #[test]
    fn test_resultant_requires_bound_columns() {
        let factor = [1];
        let q = [1.0];
        let err = aggregate_by("year", &factor, &[("q", &q[..])], &Reducer::Resultant(bindings())).unwrap_err();
        assert_eq!(err, AnalysisError::MissingColumn("dt".to_string()));
    }

    #[test]
    fn test_selector_tokens() {
        assert_eq!(Reducer::from_selector("mean", None).unwrap(), Reducer::Mean);
        assert!(Reducer::from_selector("resultant", None).is_err());
        assert!(matches!(
            Reducer::from_selector("median", None),
            Err(AnalysisError::UnknownAggregation(_))
        ));
    }

    #[test]
    fn test_mean_direction_by_group_wraps_through_north() {
        use crate::analysis::wind::polar_to_components;
        let (u1, v1) = polar_to_components(350.0, 5.0, Convention::Climate);
        let (u2, v2) = polar_to_components(10.0, 5.0, Convention::Climate);
        let (u3, v3) = polar_to_components(180.0, 5.0, Convention::Climate);
        let dir = mean_direction_by(&[6, 6, 7], &[u1, u2, u3], &[v1, v2, v3], Convention::Climate).unwrap();
        assert_eq!(dir.len(), 2);
        assert!(dir[0].min(360.0 - dir[0]) < 1e-6, "350° and 10° average to north, got {}", dir[0]);
        assert!((dir[1] - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_push_column_checks_key_count() {
        let mut s = aggregate_by("month", &[1, 2], &[("x", &[1.0, 2.0][..])], &Reducer::Mean).unwrap();
        assert!(s.push_column("y", vec![1.0]).is_err());
        s.push_column("y", vec![1.0, 2.0]).unwrap();
        assert_eq!(s.column_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_csv_output_marks_missing_as_na() {
        let factor = [1, 2];
        let x = [f64::NAN, 2.5];
        let s = aggregate_by("month", &factor, &[("x", &x[..])], &Reducer::Mean).unwrap();
        let mut buf = Vec::new();
        s.write_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "month,x\n1,NA\n2,2.5\n");
    }

    #[test]
    fn test_json_output_uses_null_for_missing() {
        let s = aggregate_by("month", &[1], &[("x", &[f64::NAN][..])], &Reducer::Mean).unwrap();
        let json = s.to_json().unwrap();
        assert!(json.contains("null"), "{}", json);
    }
}
