/// Structured logging for the aeolian transport pipeline
///
/// Provides context-rich logging tagged with the pipeline stage and the
/// column being processed. Messages go through the `log` facade; the binary
/// installs an `env_logger` backend via `init_logger`, so `RUST_LOG`
/// overrides the configured level.

use std::fmt;

use crate::model::Diagnostic;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Wind,
    Flux,
    Aggregate,
    Mobility,
    System,
}

impl Stage {
    fn target(self) -> &'static str {
        match self {
            Stage::Ingest => "aeolus::ingest",
            Stage::Wind => "aeolus::wind",
            Stage::Flux => "aeolus::flux",
            Stage::Aggregate => "aeolus::aggregate",
            Stage::Mobility => "aeolus::mobility",
            Stage::System => "aeolus::system",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Wind => write!(f, "WIND"),
            Stage::Flux => write!(f, "FLUX"),
            Stage::Aggregate => write!(f, "AGG"),
            Stage::Mobility => write!(f, "MOB"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger setup
// ---------------------------------------------------------------------------

/// Install the global `env_logger` backend.
///
/// `RUST_LOG` takes precedence over `min_level`. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_logger(min_level: LogLevel, console_timestamps: bool) {
    let default_filter = min_level.filter().to_string().to_lowercase();
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if !console_timestamps {
        builder.format_timestamp(None);
    }
    builder.target(env_logger::Target::Stderr).try_init().ok();
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn emit(level: log::Level, stage: Stage, column: Option<&str>, message: &str) {
    let column_part = column.map(|c| format!(" [{}]", c)).unwrap_or_default();
    log::log!(target: stage.target(), level, "{}{}: {}", stage, column_part, message);
}

pub fn info(stage: Stage, column: Option<&str>, message: &str) {
    emit(log::Level::Info, stage, column, message);
}

pub fn warn(stage: Stage, column: Option<&str>, message: &str) {
    emit(log::Level::Warn, stage, column, message);
}

pub fn error(stage: Stage, column: Option<&str>, message: &str) {
    emit(log::Level::Error, stage, column, message);
}

pub fn debug(stage: Stage, column: Option<&str>, message: &str) {
    emit(log::Level::Debug, stage, column, message);
}

// ---------------------------------------------------------------------------
// Diagnostic logging
// ---------------------------------------------------------------------------

/// The stage that raises a given diagnostic.
pub fn stage_of(diagnostic: &Diagnostic) -> Stage {
    match diagnostic {
        Diagnostic::TimeDisagreement { .. } => Stage::Ingest,
        Diagnostic::CelsiusSuspected { .. } | Diagnostic::TrailingGapFilled { .. } => Stage::Flux,
    }
}

/// Log a non-fatal diagnostic at WARN with its column context.
pub fn log_diagnostic(diagnostic: &Diagnostic) {
    let column = match diagnostic {
        Diagnostic::TimeDisagreement { parameter, .. } => Some(parameter.as_str()),
        Diagnostic::TrailingGapFilled { column } => Some(column.as_str()),
        Diagnostic::CelsiusSuspected { .. } => None,
    };
    warn(stage_of(diagnostic), column, &diagnostic.to_string());
}

/// Log a summary of a batch run.
pub fn log_run_summary(files: usize, rows: usize, periods: usize, diagnostics: usize) {
    let message = format!(
        "Run complete: {} file(s), {} row(s), {} period(s), {} diagnostic(s)",
        files, rows, periods, diagnostics
    );

    if diagnostics == 0 {
        info(Stage::System, None, &message);
    } else {
        warn(Stage::System, None, &message);
    }
}
