/// Flat-file reader for gridded-forecast extracts and anemometer records
///
/// Input is comma-separated text with one header line and the fixed column
/// order `parameter, unit, reference_time, valid_time, value`. Times are
/// `YYYYMMDDHHMM` in UTC. Each distinct parameter becomes one column; all
/// columns of a file are outer-joined on valid time, and files are merged in
/// the order supplied.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::logging::{self, Stage};
use crate::model::{AnalysisError, ColumnMeta, Diagnostic, RawRecord};
use crate::series::{merge_all, TimeSeries};

const TIME_FORMAT: &str = "%Y%m%d%H%M";

/// Prefix of the auxiliary column kept when reference and valid time differ.
pub const REFERENCE_TIME_PREFIX: &str = "reference_time_";

// ============================================================================
// Row and result structures
// ============================================================================

/// One CSV row as text, deserialized by position.
#[derive(Debug, Deserialize)]
struct FlatRow {
    parameter: String,
    unit: String,
    reference_time: String,
    valid_time: String,
    value: String,
}

/// A merged series plus whatever non-fatal conditions were seen building it.
#[derive(Debug, Clone)]
pub struct ParsedSeries {
    pub series: TimeSeries,
    pub diagnostics: Vec<Diagnostic>,
}

// ============================================================================
// Field parsing
// ============================================================================

/// Parse a `YYYYMMDDHHMM` timestamp as UTC.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, AnalysisError> {
    let s = s.trim();
    let err = || AnalysisError::TimeFormat { value: s.to_string() };

    if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|_| err())
}

/// Parse a value field; blank, `NA`, `NaN` and `null` are missing.
fn parse_value(s: &str) -> Result<f64, AnalysisError> {
    let s = s.trim();
    if s.is_empty() || matches!(s, "NA" | "NaN" | "nan" | "null") {
        return Ok(f64::NAN);
    }
    s.parse()
        .map_err(|_| AnalysisError::ValueFormat { value: s.to_string() })
}

// ============================================================================
// Readers
// ============================================================================

/// Read every row of a flat file into typed records.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>, AnalysisError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row: FlatRow = row?.deserialize(None)?;
        records.push(RawRecord {
            reference_time: parse_time(&row.reference_time)?,
            valid_time: parse_time(&row.valid_time)?,
            value: parse_value(&row.value)?,
            parameter: row.parameter,
            unit: row.unit,
        });
    }
    Ok(records)
}

/// Build one series per parameter and outer-join them in encounter order.
///
/// Rows of a parameter are ordered by valid time; if the same valid time
/// appears twice the later row wins. When any row's reference time differs
/// from its valid time, the reference times are kept as a
/// `reference_time_<parameter>` column (Unix seconds) and a
/// `Diagnostic::TimeDisagreement` is recorded. Otherwise no such column
/// exists.
pub fn records_to_series(records: &[RawRecord]) -> Result<ParsedSeries, AnalysisError> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&RawRecord>> = HashMap::new();
    for rec in records {
        groups
            .entry(rec.parameter.as_str())
            .or_insert_with(|| {
                order.push(rec.parameter.as_str());
                Vec::new()
            })
            .push(rec);
    }

    let mut per_parameter = Vec::with_capacity(order.len());
    let mut diagnostics = Vec::new();

    for parameter in order {
        let mut rows = groups.remove(parameter).unwrap_or_default();
        rows.sort_by_key(|r| r.valid_time);
        // keep the last occurrence of each valid time
        let mut deduped: Vec<&RawRecord> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(prev) if prev.valid_time == row.valid_time => *prev = row,
                _ => deduped.push(row),
            }
        }

        let unit = deduped.first().map(|r| r.unit.as_str()).unwrap_or_default();
        let timestamps: Vec<DateTime<Utc>> = deduped.iter().map(|r| r.valid_time).collect();
        let values: Vec<f64> = deduped.iter().map(|r| r.value).collect();
        let mut series = TimeSeries::from_column(
            parameter,
            timestamps,
            values,
            Some(ColumnMeta::new(parameter, unit)),
        )?;

        let disagreeing = deduped
            .iter()
            .filter(|r| r.reference_time != r.valid_time)
            .count();
        if disagreeing > 0 {
            let reference: Vec<f64> = deduped
                .iter()
                .map(|r| r.reference_time.timestamp() as f64)
                .collect();
            series.push_column(&format!("{}{}", REFERENCE_TIME_PREFIX, parameter), reference)?;

            let diagnostic = Diagnostic::TimeDisagreement {
                parameter: parameter.to_string(),
                rows: disagreeing,
            };
            logging::log_diagnostic(&diagnostic);
            diagnostics.push(diagnostic);
        }

        per_parameter.push(series);
    }

    Ok(ParsedSeries {
        series: merge_all(&per_parameter),
        diagnostics,
    })
}

/// Parse flat-file text from any reader.
pub fn parse_reader<R: Read>(reader: R) -> Result<ParsedSeries, AnalysisError> {
    let records = read_records(reader)?;
    records_to_series(&records)
}

/// Parse one flat file from disk.
pub fn parse_file(path: &Path) -> Result<ParsedSeries, AnalysisError> {
    let file = File::open(path)
        .map_err(|e| AnalysisError::Io(format!("{}: {}", path.display(), e)))?;
    let parsed = parse_reader(file)?;
    logging::info(
        Stage::Ingest,
        None,
        &format!(
            "{}: {} row(s), {} parameter(s)",
            path.display(),
            parsed.series.len(),
            parsed.series.metadata().len()
        ),
    );
    Ok(parsed)
}

/// Parse several files and merge them in the order supplied.
///
/// The metadata list of the result is the concatenation of each file's
/// metadata, file order first, then parameter order within a file.
pub fn parse_files<P: AsRef<Path>>(paths: &[P]) -> Result<ParsedSeries, AnalysisError> {
    let mut series = TimeSeries::new();
    let mut diagnostics = Vec::new();
    for path in paths {
        let parsed = parse_file(path.as_ref())?;
        series = series.merge(&parsed.series);
        diagnostics.extend(parsed.diagnostics);
    }
    Ok(ParsedSeries { series, diagnostics })
}

// ============================================================================
// Tests
// ============================================================================
