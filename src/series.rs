//! Time-indexed multi-column series with provenance metadata.
//!
//! A `TimeSeries` pairs a strictly increasing timestamp index with named
//! numeric columns (missing = NaN) and an append-only list of
//! `(parameter, unit)` pairs recording every parameter ever merged in.
//!
//! Series are built by the parser, grown by `merge` (outer join on time)
//! and by derivation steps (`push_column`). Nothing removes a column;
//! reductions produce a separate `Summary`.

use chrono::{DateTime, Datelike, Utc};
use std::str::FromStr;

use crate::logging::{self, Stage};
use crate::model::{AnalysisError, ColumnMeta};

// ---------------------------------------------------------------------------
// Calendar periods
// ---------------------------------------------------------------------------

/// Calendar unit used to group rows for summarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Year,
    Month,
}

impl Period {
    /// Numeric key of `t` for this period: the calendar year, or the month 1–12.
    pub fn key(&self, t: &DateTime<Utc>) -> i32 {
        match self {
            Period::Year => t.year(),
            Period::Month => t.month() as i32,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Year => "year",
            Period::Month => "month",
        }
    }
}

impl FromStr for Period {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Period::Year),
            "month" => Ok(Period::Month),
            other => Err(AnalysisError::UnknownPeriod(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
    metadata: Vec<ColumnMeta>,
}

impl TimeSeries {
    /// An empty series: the identity element for `merge`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a single-column series.
    ///
    /// `timestamps` must be strictly increasing and the same length as
    /// `values`. When `meta` is given it becomes the first metadata entry.
    pub fn from_column(
        name: &str,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        meta: Option<ColumnMeta>,
    ) -> Result<Self, AnalysisError> {
        if timestamps.len() != values.len() {
            return Err(AnalysisError::LengthMismatch {
                expected: timestamps.len(),
                found: values.len(),
            });
        }
        if let Some(index) = timestamps.windows(2).position(|w| w[0] >= w[1]) {
            return Err(AnalysisError::UnorderedTimestamps { index: index + 1 });
        }

        Ok(TimeSeries {
            timestamps,
            columns: vec![Column {
                name: name.to_string(),
                values,
            }],
            metadata: meta.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn metadata(&self) -> &[ColumnMeta] {
        &self.metadata
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], AnalysisError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
    }

    /// Appends a derived column aligned to the existing index.
    ///
    /// Derived columns do not add metadata; the metadata list tracks
    /// ingested parameters only. Pushing a name that already exists
    /// replaces nothing and returns an error instead.
    pub fn push_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), AnalysisError> {
        if values.len() != self.timestamps.len() {
            return Err(AnalysisError::LengthMismatch {
                expected: self.timestamps.len(),
                found: values.len(),
            });
        }
        if self.has_column(name) {
            return Err(AnalysisError::Config(format!("column {} already exists", name)));
        }
        self.columns.push(Column {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    /// Outer join on time.
    ///
    /// The result index is the union of both indexes. Columns are reindexed
    /// onto it with NaN wherever a side had no row. A column name present in
    /// both inputs is coalesced: `self` wins where it has a value, `other`
    /// fills the rest. Metadata is `self.metadata` followed by
    /// `other.metadata`.
    pub fn merge(&self, other: &TimeSeries) -> TimeSeries {
        let timestamps = union_sorted(&self.timestamps, &other.timestamps);

        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: reindex(&self.timestamps, &c.values, &timestamps),
            })
            .collect();

        for col in &other.columns {
            let values = reindex(&other.timestamps, &col.values, &timestamps);
            match columns.iter_mut().find(|c| c.name == col.name) {
                Some(existing) => {
                    let conflicts = coalesce(&mut existing.values, &values);
                    if conflicts > 0 {
                        logging::debug(
                            Stage::Ingest,
                            Some(&col.name),
                            &format!("{} overlapping value(s) disagreed; kept earlier series", conflicts),
                        );
                    }
                }
                None => columns.push(Column {
                    name: col.name.clone(),
                    values,
                }),
            }
        }

        let mut metadata = self.metadata.clone();
        metadata.extend(other.metadata.iter().cloned());

        TimeSeries {
            timestamps,
            columns,
            metadata,
        }
    }

    /// Linear interpolation of interior gaps in `name`, positioned by time.
    /// Leading and trailing gaps are left missing.
    pub fn interpolated(&self, name: &str) -> Result<Vec<f64>, AnalysisError> {
        let values = self.column(name)?;
        Ok(interpolate_gaps(&self.epoch_seconds(), values))
    }

    /// Seconds each row represents.
    ///
    /// A row lasts until the next one, capped at the nominal sampling
    /// interval (the median spacing). The row before a data gap therefore
    /// counts for one interval, not the whole gap. The last row gets the
    /// nominal interval; a single-row series has no defined duration (NaN).
    pub fn sample_durations(&self) -> Vec<f64> {
        let secs = self.epoch_seconds();
        let spacing: Vec<f64> = secs.windows(2).map(|w| w[1] - w[0]).collect();
        let Some(nominal) = nominal_interval(&spacing) else {
            return vec![f64::NAN; secs.len()];
        };

        let mut out: Vec<f64> = spacing.iter().map(|dt| dt.min(nominal)).collect();
        out.push(nominal);
        out
    }

    /// Calendar key of every row.
    pub fn calendar_factor(&self, period: Period) -> Vec<i32> {
        self.timestamps.iter().map(|t| period.key(t)).collect()
    }

    pub fn epoch_seconds(&self) -> Vec<f64> {
        self.timestamps.iter().map(|t| t.timestamp() as f64).collect()
    }
}

/// Folds series together in the order given.
pub fn merge_all<'a, I>(series: I) -> TimeSeries
where
    I: IntoIterator<Item = &'a TimeSeries>,
{
    series
        .into_iter()
        .fold(TimeSeries::new(), |acc, next| acc.merge(next))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn union_sorted(a: &[DateTime<Utc>], b: &[DateTime<Utc>]) -> Vec<DateTime<Utc>> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else if b[j] < a[i] {
            out.push(b[j]);
            j += 1;
        } else {
            out.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn reindex(source: &[DateTime<Utc>], values: &[f64], target: &[DateTime<Utc>]) -> Vec<f64> {
    let mut j = 0;
    target
        .iter()
        .map(|t| {
            while j < source.len() && source[j] < *t {
                j += 1;
            }
            if j < source.len() && source[j] == *t {
                values[j]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Median spacing (lower middle for an even count); `None` when empty.
fn nominal_interval(spacing: &[f64]) -> Option<f64> {
    if spacing.is_empty() {
        return None;
    }
    let mut sorted = spacing.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Fills NaN slots of `into` from `from`; returns how many slots had two
/// different defined values.
fn coalesce(into: &mut [f64], from: &[f64]) -> usize {
    let mut conflicts = 0;
    for (dst, src) in into.iter_mut().zip(from) {
        if dst.is_nan() {
            *dst = *src;
        } else if !src.is_nan() && dst != src {
            conflicts += 1;
        }
    }
    conflicts
}

/// Linear interpolation across interior NaN runs. `positions` gives the
/// x coordinate of each sample and must be increasing.
pub fn interpolate_gaps(positions: &[f64], values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    let mut last_known: Option<usize> = None;

    for i in 0..values.len() {
        if values[i].is_nan() {
            continue;
        }
        if let Some(k) = last_known {
            if i > k + 1 {
                let (x0, y0) = (positions[k], values[k]);
                let (x1, y1) = (positions[i], values[i]);
                for (g, slot) in out.iter_mut().enumerate().take(i).skip(k + 1) {
                    let frac = (positions[g] - x0) / (x1 - x0);
                    *slot = y0 + frac * (y1 - y0);
                }
            }
        }
        last_known = Some(i);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
