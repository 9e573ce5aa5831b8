//! Batch driver: parse, merge, derive, summarize.
//!
//! Files are merged strictly in the order given so the metadata list is
//! deterministic. Derived columns are appended to the merged series under
//! the fixed names below.

use std::path::Path;

use crate::analysis::aggregate::{aggregate, aggregate_columns, mean_direction_by, Reducer, ResultantColumns, Summary};
use crate::analysis::flux::{air_density_series, sediment_flux, threshold_velocity, FluxInputs};
use crate::analysis::methods::{FluxModel, FluxRegistry, ThresholdModel, ThresholdParams, ThresholdRegistry};
use crate::analysis::mobility::{mobility_by_period, MobilitySummary};
use crate::analysis::wind::{friction_velocity, wind_components_to_polar, Convention};
use crate::config::AnalysisConfig;
use crate::ingest::flat_file::parse_files;
use crate::logging::{self, Stage};
use crate::model::{AnalysisError, Diagnostic};
use crate::series::{Period, TimeSeries};

pub const DIRECTION_COLUMN: &str = "wind_direction";
pub const SPEED_COLUMN: &str = "wind_speed";
pub const ELEVATION_COLUMN: &str = "wind_elevation";
pub const FRICTION_VELOCITY_COLUMN: &str = "friction_velocity";
pub const AIR_DENSITY_COLUMN: &str = "air_density";
pub const FLUX_COLUMN: &str = "sediment_flux";
pub const DURATION_COLUMN: &str = "duration_s";

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Merged input plus derived columns.
    pub series: TimeSeries,
    pub threshold_velocity: f64,
    pub summary: Summary,
    /// Present when a soil-moisture column is bound.
    pub mobility: Option<MobilitySummary>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Pipeline {
    config: AnalysisConfig,
    thresholds: ThresholdRegistry,
    fluxes: FluxRegistry,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Pipeline {
            config,
            thresholds: ThresholdRegistry::with_builtins(),
            fluxes: FluxRegistry::with_builtins(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn register_threshold_model(&mut self, model: ThresholdModel) {
        self.thresholds.register(model);
    }

    pub fn register_flux_model(&mut self, model: FluxModel) {
        self.fluxes.register(model);
    }

    /// Parse `paths` in order, derive transport columns and summarize.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> Result<RunReport, AnalysisError> {
        // validate selectors before touching any file
        let period: Period = self.config.period.parse()?;
        let reducer = Reducer::from_selector(&self.config.aggregation, Some(transport_columns()))?;

        let parsed = parse_files(paths)?;
        let mut series = parsed.series;
        let mut diagnostics = parsed.diagnostics;

        let threshold = self.derive(&mut series, &mut diagnostics)?;
        let summary = self.summarize(&series, period, &reducer)?;
        let mobility = match &self.config.columns.soil_moisture {
            Some(moisture) => Some(mobility_by_period(&series, period, &transport_columns(), moisture)?),
            None => None,
        };

        logging::log_run_summary(paths.len(), series.len(), summary.len(), diagnostics.len());
        Ok(RunReport {
            series,
            threshold_velocity: threshold,
            summary,
            mobility,
            diagnostics,
        })
    }

    /// Reduce `series` by `period`.
    ///
    /// Scalar reducers skip the direction column: angles cannot be averaged
    /// or summed as plain numbers. `mean` reports the direction of the
    /// period's vector-mean wind instead.
    pub fn summarize(&self, series: &TimeSeries, period: Period, reducer: &Reducer) -> Result<Summary, AnalysisError> {
        if let Reducer::Resultant(_) = reducer {
            return aggregate(series, period, reducer);
        }

        let names: Vec<&str> = series
            .column_names()
            .into_iter()
            .filter(|name| *name != DIRECTION_COLUMN)
            .collect();
        let mut summary = aggregate_columns(series, period, &names, reducer)?;

        if *reducer == Reducer::Mean {
            let convention: Convention = self.config.convention.parse()?;
            let cols = &self.config.columns;
            let direction = mean_direction_by(
                &series.calendar_factor(period),
                series.column(&cols.u)?,
                series.column(&cols.v)?,
                convention,
            )?;
            summary.push_column(DIRECTION_COLUMN, direction)?;
        }
        Ok(summary)
    }

    /// Append wind, friction velocity, air density, flux and duration
    /// columns to `series`. Returns the threshold friction velocity used.
    pub fn derive(
        &self,
        series: &mut TimeSeries,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<f64, AnalysisError> {
        let cfg = &self.config;
        let cols = &cfg.columns;
        let convention: Convention = cfg.convention.parse()?;

        let u = series.column(&cols.u)?.to_vec();
        let v = series.column(&cols.v)?.to_vec();
        let w = match &cols.w {
            Some(name) => Some(series.column(name)?.to_vec()),
            None => None,
        };

        let polar = wind_components_to_polar(&u, &v, w.as_deref(), convention)?;
        // log law over horizontal speed, even when speed is 3D
        let ustar: Vec<f64> = u
            .iter()
            .zip(&v)
            .map(|(a, b)| friction_velocity(a.hypot(*b), cfg.measurement_height_m, cfg.roughness_length_m))
            .collect();
        series.push_column(DIRECTION_COLUMN, polar.direction)?;
        series.push_column(SPEED_COLUMN, polar.speed)?;
        series.push_column(ELEVATION_COLUMN, polar.elevation)?;
        logging::debug(Stage::Wind, Some(&cols.u), &format!("{:?} convention", convention));

        let density = match (&cols.pressure, &cols.temperature) {
            (Some(p), Some(t)) => {
                let result = air_density_series(series, p, t, cfg.interpolate_temperature)?;
                diagnostics.extend(result.diagnostics);
                series.push_column(AIR_DENSITY_COLUMN, result.density.clone())?;
                result.density
            }
            _ => vec![cfg.air_density],
        };

        let threshold = threshold_velocity(
            &self.thresholds,
            &cfg.threshold_method,
            &ThresholdParams {
                grain_diameter: cfg.grain_diameter_m,
                particle_density: cfg.particle_density,
                air_density: cfg.air_density,
            },
        )?;
        logging::info(
            Stage::Flux,
            None,
            &format!("{} threshold friction velocity {:.4} m/s", cfg.threshold_method, threshold),
        );

        let flux = sediment_flux(
            &self.fluxes,
            &cfg.flux_method,
            &FluxInputs {
                friction_velocity: &ustar,
                threshold_velocity: &[threshold],
                air_density: &density,
                force_threshold: cfg.force_threshold,
            },
        )?;
        series.push_column(FRICTION_VELOCITY_COLUMN, ustar)?;
        series.push_column(FLUX_COLUMN, flux)?;

        let durations = series.sample_durations();
        series.push_column(DURATION_COLUMN, durations)?;

        Ok(threshold)
    }
}

fn transport_columns() -> ResultantColumns {
    ResultantColumns {
        flux: FLUX_COLUMN.to_string(),
        duration: DURATION_COLUMN.to_string(),
        azimuth: DIRECTION_COLUMN.to_string(),
    }
}
