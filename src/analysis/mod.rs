/// Derived physical quantities and period summaries.
///
/// Submodules:
/// - `wind` — component/polar conversion, mean direction, log-law profile.
/// - `methods` — named threshold and flux models and their registries.
/// - `flux` — threshold velocity, sediment flux, vector resultant, air density.
/// - `aggregate` — calendar-period summaries with pluggable reducers.
/// - `mobility` — flux-to-moisture mobility index and its anomaly.

pub mod aggregate;
pub mod flux;
pub mod methods;
pub mod mobility;
pub mod wind;
