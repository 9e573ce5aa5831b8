/// Integration tests for the file → summary pipeline
///
/// Tests verify:
/// 1. Multi-file ingestion and merge order
/// 2. Time disagreement handling across files
/// 3. Derivation + aggregation end to end
/// 4. Fatal selector errors surface from `run`
///
/// Fixtures are written to a per-test directory under the system temp dir.

use std::fs;
use std::path::PathBuf;

use aeolus_service::analysis::aggregate::{aggregate, Reducer};
use aeolus_service::config::{AnalysisConfig, ColumnBindings};
use aeolus_service::ingest::flat_file::{parse_file, parse_files};
use aeolus_service::model::{AnalysisError, Diagnostic};
use aeolus_service::pipeline::{Pipeline, DIRECTION_COLUMN, DURATION_COLUMN, FLUX_COLUMN};
use aeolus_service::series::Period;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn fixture_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("aeolus_it_{}_{}", test, std::process::id()));
    fs::create_dir_all(&dir).expect("create fixture dir");
    dir
}

fn write_fixture(dir: &PathBuf, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write fixture");
    path
}

/// Hourly u10/v10 rows starting at `start` (YYYYMMDDHH), strong
/// south-westerly flow except where `calm` is true.
fn wind_file(start: &str, hours: usize, calm: &[usize]) -> String {
    let mut body = String::from("parameter,unit,reference_time,valid_time,value\n");
    for h in 0..hours {
        let stamp = format!("{}{:02}00", start, h);
        let (u, v) = if calm.contains(&h) { (0.3, 0.3) } else { (12.0, 12.0) };
        body.push_str(&format!("u10,m/s,{0},{0},{1}\n", stamp, u));
        body.push_str(&format!("v10,m/s,{0},{0},{1}\n", stamp, v));
    }
    body
}

/// Hourly soil-moisture rows (no header) matching `wind_file` timestamps.
fn moisture_rows(start: &str, hours: usize, value: f64) -> String {
    (0..hours)
        .map(|h| {
            let stamp = format!("{}{:02}00", start, h);
            format!("swvl1,m3/m3,{0},{0},{1}\n", stamp, value)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Ingestion
// ---------------------------------------------------------------------------

#[test]
fn test_disjoint_files_union_timestamps_and_double_metadata() {
    let dir = fixture_dir("disjoint");
    let jan = write_fixture(&dir, "jan.csv", &wind_file("20200115", 3, &[]));
    let jul = write_fixture(&dir, "jul.csv", &wind_file("20200715", 4, &[]));

    let single = parse_file(&jan).unwrap();
    let merged = parse_files(&[jan.clone(), jul.clone()]).unwrap();

    assert_eq!(merged.series.len(), 7, "3 + 4 disjoint hours");
    assert_eq!(merged.series.metadata().len(), 2 * single.series.metadata().len());
    let params: Vec<&str> = merged.series.metadata().iter().map(|m| m.parameter.as_str()).collect();
    assert_eq!(params, vec!["u10", "v10", "u10", "v10"]);
    assert!(merged.series.column("u10").unwrap().iter().all(|v| !v.is_nan()));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_order_controls_metadata_order() {
    let dir = fixture_dir("order");
    let a = write_fixture(
        &dir,
        "a.csv",
        "parameter,unit,reference_time,valid_time,value\nsp,Pa,202001010000,202001010000,101000\n",
    );
    let b = write_fixture(
        &dir,
        "b.csv",
        "parameter,unit,reference_time,valid_time,value\nt2m,K,202001010000,202001010000,275\n",
    );

    let ab = parse_files(&[a.clone(), b.clone()]).unwrap();
    let ba = parse_files(&[b, a]).unwrap();
    assert_eq!(ab.series.metadata()[0].parameter, "sp");
    assert_eq!(ba.series.metadata()[0].parameter, "t2m");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_forecast_lead_times_are_kept_and_reported() {
    let dir = fixture_dir("lead");
    let path = write_fixture(
        &dir,
        "forecast.csv",
        "parameter,unit,reference_time,valid_time,value\n\
         u10,m/s,202003010000,202003010000,4.0\n\
         u10,m/s,202003010000,202003010600,5.0\n",
    );

    let parsed = parse_file(&path).unwrap();
    assert_eq!(
        parsed.diagnostics,
        vec![Diagnostic::TimeDisagreement { parameter: "u10".to_string(), rows: 1 }]
    );
    assert!(parsed.series.has_column("reference_time_u10"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_malformed_timestamp_is_fatal() {
    let dir = fixture_dir("badtime");
    let path = write_fixture(
        &dir,
        "bad.csv",
        "parameter,unit,reference_time,valid_time,value\nu10,m/s,2020-03-01,202003010000,4.0\n",
    );
    assert!(matches!(parse_file(&path), Err(AnalysisError::TimeFormat { .. })));
    fs::remove_dir_all(&dir).ok();
}

// ---------------------------------------------------------------------------
// 2. End to end
// ---------------------------------------------------------------------------

#[test]
fn test_yearly_resultant_from_two_files() {
    let dir = fixture_dir("resultant");
    let y2019 = write_fixture(&dir, "2019.csv", &wind_file("20190601", 4, &[3]));
    let y2020 = write_fixture(&dir, "2020.csv", &wind_file("20200601", 4, &[]));

    let config = AnalysisConfig {
        aggregation: "resultant".to_string(),
        ..AnalysisConfig::default()
    };
    let report = Pipeline::new(config).run(&[y2019, y2020]).unwrap();

    assert_eq!(report.summary.keys, vec![2019, 2020]);
    let az = report.summary.column("sediment_flux_azimuth").unwrap();
    let mag = report.summary.column("sediment_flux_magnitude").unwrap();
    for (a, m) in az.iter().zip(mag) {
        assert!((a - 225.0).abs() < 1e-6, "constant SW wind should give 225°, got {}", a);
        assert!(*m > 0.0);
    }
    assert!(mag[0] < mag[1], "2019 ended calm and moved less sand");

    // constant direction: vector sum equals scalar sum of flux × duration
    let flux = report.series.column(FLUX_COLUMN).unwrap();
    let dt = report.series.column(DURATION_COLUMN).unwrap();
    let factor = report.series.calendar_factor(Period::Year);
    let scalar_2020: f64 = (0..flux.len())
        .filter(|&i| factor[i] == 2020)
        .map(|i| flux[i] * dt[i])
        .sum();
    assert!((mag[1] - scalar_2020).abs() / scalar_2020 < 1e-9);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_gap_between_files_does_not_inflate_transport() {
    let dir = fixture_dir("gap");
    let y2019 = write_fixture(&dir, "2019.csv", &wind_file("20190601", 2, &[]));
    let y2020 = write_fixture(&dir, "2020.csv", &wind_file("20200601", 2, &[]));

    let config = AnalysisConfig {
        aggregation: "resultant".to_string(),
        ..AnalysisConfig::default()
    };
    let report = Pipeline::new(config).run(&[y2019, y2020]).unwrap();

    assert_eq!(report.series.column(DURATION_COLUMN).unwrap(), &[3600.0; 4]);
    let mag = report.summary.column("sediment_flux_magnitude").unwrap();
    assert!(
        (mag[0] - mag[1]).abs() / mag[1] < 1e-9,
        "identical wind in both years must move the same sand: {:?}",
        mag
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_soil_moisture_binding_reports_mobility() {
    let dir = fixture_dir("mobility");
    let mut wet = wind_file("20190601", 3, &[]);
    wet.push_str(&moisture_rows("20190601", 3, 0.30));
    let mut dry = wind_file("20200601", 3, &[]);
    dry.push_str(&moisture_rows("20200601", 3, 0.15));
    let y2019 = write_fixture(&dir, "2019.csv", &wet);
    let y2020 = write_fixture(&dir, "2020.csv", &dry);

    let config = AnalysisConfig {
        columns: ColumnBindings {
            soil_moisture: Some("swvl1".to_string()),
            ..ColumnBindings::default()
        },
        ..AnalysisConfig::default()
    };
    let report = Pipeline::new(config).run(&[y2019, y2020]).unwrap();
    let mobility = report.mobility.expect("mobility reported when moisture is bound");

    assert_eq!(mobility.keys, vec![2019, 2020]);
    assert!(mobility.index.iter().all(|v| *v > 0.0));
    assert!(
        (mobility.index[1] / mobility.index[0] - 2.0).abs() < 1e-9,
        "half the moisture under the same wind doubles mobility"
    );
    assert!(mobility.anomaly[0] < 0.0 && mobility.anomaly[1] > 0.0);

    let unbound = Pipeline::new(AnalysisConfig::default())
        .run(&[write_fixture(&dir, "plain.csv", &wind_file("20200601", 2, &[]))])
        .unwrap();
    assert!(unbound.mobility.is_none());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_monthly_mean_summary_reports_every_month() {
    let dir = fixture_dir("monthly");
    let path = write_fixture(&dir, "winds.csv", &wind_file("20210310", 2, &[]));
    let config = AnalysisConfig {
        period: "month".to_string(),
        ..AnalysisConfig::default()
    };
    let report = Pipeline::new(config).run(&[path]).unwrap();

    assert_eq!(report.summary.keys, vec![3]);
    let direction = report.summary.column(DIRECTION_COLUMN).unwrap();
    assert!((direction[0] - 225.0).abs() < 1e-6, "vector mean of constant SW wind, got {}", direction[0]);
    let mut buf = Vec::new();
    report.summary.write_csv(&mut buf).unwrap();
    assert!(String::from_utf8(buf).unwrap().starts_with("month,u10,v10"));

    let quantiles = aggregate(&report.series, Period::Month, &Reducer::Quantiles).unwrap();
    assert!(quantiles.column("wind_speed_p50").is_some());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_unknown_selectors_surface_as_typed_errors() {
    let dir = fixture_dir("selectors");
    let path = write_fixture(&dir, "winds.csv", &wind_file("20210310", 2, &[]));

    let bad_convention = AnalysisConfig {
        convention: "nautical".to_string(),
        ..AnalysisConfig::default()
    };
    assert_eq!(
        Pipeline::new(bad_convention).run(&[path.clone()]).unwrap_err(),
        AnalysisError::UnknownConvention("nautical".to_string())
    );

    let bad_threshold = AnalysisConfig {
        threshold_method: "bagnold".to_string(),
        ..AnalysisConfig::default()
    };
    assert!(matches!(
        Pipeline::new(bad_threshold).run(&[path.clone()]),
        Err(AnalysisError::UnknownMethod { kind: "threshold", .. })
    ));

    let bad_aggregation = AnalysisConfig {
        aggregation: "median".to_string(),
        ..AnalysisConfig::default()
    };
    assert!(matches!(
        Pipeline::new(bad_aggregation).run(&[path]),
        Err(AnalysisError::UnknownAggregation(_))
    ));

    fs::remove_dir_all(&dir).ok();
}
