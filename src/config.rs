//! Analysis configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file is
//! valid. Selector fields stay strings here and are validated when the
//! pipeline starts, so an unknown token surfaces as the matching typed
//! error (`UnknownConvention`, `UnknownMethod`, ...).

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::AnalysisError;

/// Environment variable naming the config file for `from_env`.
pub const CONFIG_ENV_VAR: &str = "AEOLUS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// `sonic` or `climate`.
    pub convention: String,
    pub threshold_method: String,
    pub flux_method: String,
    pub grain_diameter_m: f64,
    /// kg/m³
    pub particle_density: f64,
    /// kg/m³; used for the threshold and when no pressure/temperature is bound.
    pub air_density: f64,
    pub force_threshold: bool,
    /// Height of the wind measurement above the surface, m.
    pub measurement_height_m: f64,
    pub roughness_length_m: f64,
    /// Interpolate sparse temperature before computing air density.
    pub interpolate_temperature: bool,
    /// `year` or `month`.
    pub period: String,
    /// `mean`, `quantiles`, `sum` or `resultant`.
    pub aggregation: String,
    pub columns: ColumnBindings,
}

/// Which input parameters feed the derivations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnBindings {
    pub u: String,
    pub v: String,
    pub w: Option<String>,
    /// Surface pressure, Pa.
    pub pressure: Option<String>,
    /// Air temperature, K.
    pub temperature: Option<String>,
    /// Soil-moisture proxy; when bound the run also reports mobility.
    pub soil_moisture: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            convention: "climate".to_string(),
            threshold_method: "shao_lu".to_string(),
            flux_method: "corrected_white".to_string(),
            grain_diameter_m: 0.00025,
            particle_density: 2650.0,
            air_density: 1.225,
            force_threshold: true,
            measurement_height_m: 10.0,
            roughness_length_m: 0.001,
            interpolate_temperature: true,
            period: "year".to_string(),
            aggregation: "mean".to_string(),
            columns: ColumnBindings::default(),
        }
    }
}

impl Default for ColumnBindings {
    fn default() -> Self {
        ColumnBindings {
            u: "u10".to_string(),
            v: "v10".to_string(),
            w: None,
            pressure: None,
            temperature: None,
            soil_moisture: None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, AnalysisError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let text = fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Reads `.env` if present, then loads the file named by
    /// `AEOLUS_CONFIG`. Defaults when the variable is unset.
    pub fn from_env() -> Result<Self, AnalysisError> {
        dotenv::dotenv().ok();
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }
}
