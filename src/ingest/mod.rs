/// Data ingestion for the aeolian transport toolkit.
///
/// Submodules:
/// - `flat_file` — per-parameter flat records (gridded-forecast extracts,
///   anemometer exports) into one merged `TimeSeries`.

pub mod flat_file;
