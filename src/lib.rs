//! Aeolian transport analysis for irregular, multi-source wind records.
//!
//! Flat per-parameter files are parsed into a merged [`series::TimeSeries`],
//! enriched with wind kinematics and sediment flux, and reduced into
//! calendar-period [`analysis::aggregate::Summary`] tables.

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod series;
