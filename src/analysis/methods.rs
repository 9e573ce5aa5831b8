/// Named-model registries for threshold friction velocity and sediment flux.
///
/// Each physical model is a plain function behind a string token. The
/// built-in tables below are the canonical list; a registry starts from
/// them and callers may `register` further models at startup without
/// touching any call site. Looking up an unregistered name is a typed
/// `AnalysisError::UnknownMethod`.

use crate::model::{AnalysisError, BULK_DENSITY, GRAVITY};

// ---------------------------------------------------------------------------
// Model parameters
// ---------------------------------------------------------------------------

/// Inputs to a threshold friction velocity model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    /// Grain diameter, m.
    pub grain_diameter: f64,
    /// Particle density, kg/m³.
    pub particle_density: f64,
    /// Air density, kg/m³.
    pub air_density: f64,
}

/// Inputs to a flux model for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxParams {
    /// Friction velocity u*, m/s.
    pub friction_velocity: f64,
    /// Threshold friction velocity u*_t, m/s.
    pub threshold_velocity: f64,
    /// Air density, kg/m³.
    pub air_density: f64,
    /// Force flux to exactly zero below threshold.
    pub force_threshold: bool,
}

pub type ThresholdFn = fn(&ThresholdParams) -> f64;
pub type FluxFn = fn(&FluxParams) -> f64;

// ---------------------------------------------------------------------------
// Model metadata
// ---------------------------------------------------------------------------

/// A registered threshold friction velocity model.
#[derive(Clone, Copy)]
pub struct ThresholdModel {
    /// Selector token, e.g. `shao_lu`.
    pub name: &'static str,
    /// Literature reference or short description.
    pub description: &'static str,
    pub compute: ThresholdFn,
}

/// A registered sediment flux model.
#[derive(Clone, Copy)]
pub struct FluxModel {
    pub name: &'static str,
    pub description: &'static str,
    /// Unit of the returned flux.
    pub unit: &'static str,
    pub compute: FluxFn,
}

/// Threshold models available without registration.
pub static THRESHOLD_MODELS: &[ThresholdModel] = &[ThresholdModel {
    name: "shao_lu",
    description: "Shao & Lu (2000) cohesion-corrected threshold",
    compute: shao_lu,
}];

/// Flux models available without registration.
pub static FLUX_MODELS: &[FluxModel] = &[
    FluxModel {
        name: "corrected_white",
        description: "White (1979) saltation flux with threshold correction",
        unit: "kg/m/s",
        compute: corrected_white,
    },
    FluxModel {
        name: "corrected_white_bulk",
        description: "corrected_white divided by deposit bulk density",
        unit: "m3/m/s",
        compute: corrected_white_bulk,
    },
];

// ---------------------------------------------------------------------------
// Built-in models
// ---------------------------------------------------------------------------

const SHAO_LU_A: f64 = 0.0123;
const SHAO_LU_GAMMA: f64 = 0.0003;
const WHITE_C: f64 = 2.61;

/// sqrt(A · (ρs·g·d + γ / (ρa·d)))
pub fn shao_lu(p: &ThresholdParams) -> f64 {
    let d = p.grain_diameter;
    (SHAO_LU_A * (p.particle_density * GRAVITY * d + SHAO_LU_GAMMA / (p.air_density * d))).sqrt()
}

/// 2.61 · (ρa/g) · u*³ · (1 − u*t/u*) · (1 + u*t/u*)²
///
/// Below threshold the result is exactly zero when `force_threshold` is
/// set. Negative results, which the formula produces just under
/// threshold, are clamped to zero either way. Missing inputs stay missing.
pub fn corrected_white(p: &FluxParams) -> f64 {
    let (ustar, ut) = (p.friction_velocity, p.threshold_velocity);
    if ustar.is_nan() || ut.is_nan() || p.air_density.is_nan() {
        return f64::NAN;
    }
    if (p.force_threshold && ustar < ut) || ustar <= 0.0 {
        return 0.0;
    }
    let ratio = ut / ustar;
    let q = WHITE_C * (p.air_density / GRAVITY) * ustar.powi(3) * (1.0 - ratio) * (1.0 + ratio).powi(2);
    q.max(0.0)
}

pub fn corrected_white_bulk(p: &FluxParams) -> f64 {
    corrected_white(p) / BULK_DENSITY
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ThresholdRegistry {
    models: Vec<ThresholdModel>,
}

impl ThresholdRegistry {
    pub fn with_builtins() -> Self {
        ThresholdRegistry {
            models: THRESHOLD_MODELS.to_vec(),
        }
    }

    /// Add a model, replacing any existing model of the same name.
    pub fn register(&mut self, model: ThresholdModel) {
        self.models.retain(|m| m.name != model.name);
        self.models.push(model);
    }

    pub fn get(&self, name: &str) -> Result<&ThresholdModel, AnalysisError> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AnalysisError::UnknownMethod {
                kind: "threshold",
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.name).collect()
    }
}

impl Default for ThresholdRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[derive(Clone)]
pub struct FluxRegistry {
    models: Vec<FluxModel>,
}

impl FluxRegistry {
    pub fn with_builtins() -> Self {
        FluxRegistry {
            models: FLUX_MODELS.to_vec(),
        }
    }

    /// Add a model, replacing any existing model of the same name.
    pub fn register(&mut self, model: FluxModel) {
        self.models.retain(|m| m.name != model.name);
        self.models.push(model);
    }

    pub fn get(&self, name: &str) -> Result<&FluxModel, AnalysisError> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AnalysisError::UnknownMethod {
                kind: "flux",
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.name).collect()
    }
}

impl Default for FluxRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn flux_params(ustar: f64, ut: f64, force: bool) -> FluxParams {
        FluxParams {
            friction_velocity: ustar,
            threshold_velocity: ut,
            air_density: 1.2,
            force_threshold: force,
        }
    }

    #[test]
    fn test_model_names_are_unique() {
        let mut names: Vec<&str> = FLUX_MODELS.iter().map(|m| m.name).collect();
        names.extend(THRESHOLD_MODELS.iter().map(|m| m.name));
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before, "duplicate model name in built-in tables");
    }

    #[test]
    fn test_shao_lu_medium_sand() {
        let ut = shao_lu(&ThresholdParams {
            grain_diameter: 0.00025,
            particle_density: 2650.0,
            air_density: 1.225,
        });
        assert!(ut > 0.0 && ut.is_finite(), "threshold should be positive, got {}", ut);
    }

    #[test]
    fn test_corrected_white_above_and_below_threshold() {
        assert!(corrected_white(&flux_params(0.5, 0.3, true)) > 0.0);
        assert_eq!(corrected_white(&flux_params(0.2, 0.3, true)), 0.0);
    }

    #[test]
    fn test_corrected_white_clamps_negative_without_forcing() {
        assert_eq!(corrected_white(&flux_params(0.29, 0.3, false)), 0.0);
    }

    #[test]
    fn test_corrected_white_propagates_missing() {
        assert!(corrected_white(&flux_params(f64::NAN, 0.3, true)).is_nan());
    }

    #[test]
    fn test_bulk_variant_divides_by_bulk_density() {
        let p = flux_params(0.5, 0.3, true);
        let mass = corrected_white(&p);
        assert!((corrected_white_bulk(&p) - mass / 1500.0).abs() < 1e-15);
    }

    #[test]
    fn test_unknown_names_are_typed_errors() {
        let flux = FluxRegistry::with_builtins();
        assert!(matches!(
            flux.get("bagnold"),
            Err(AnalysisError::UnknownMethod { kind: "flux", .. })
        ));
        let threshold = ThresholdRegistry::with_builtins();
        assert!(matches!(
            threshold.get("bagnold"),
            Err(AnalysisError::UnknownMethod { kind: "threshold", .. })
        ));
    }

    #[test]
    fn test_registering_a_model_makes_it_selectable() {
        fn linear(p: &FluxParams) -> f64 {
            (p.friction_velocity - p.threshold_velocity).max(0.0)
        }
        let mut registry = FluxRegistry::with_builtins();
        registry.register(FluxModel {
            name: "linear_excess",
            description: "test model",
            unit: "m/s",
            compute: linear,
        });
        let model = registry.get("linear_excess").unwrap();
        assert!(((model.compute)(&flux_params(0.5, 0.3, true)) - 0.2).abs() < 1e-12);
        assert_eq!(registry.names().len(), FLUX_MODELS.len() + 1);
    }
}
