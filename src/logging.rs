//! Logging configuration and initialization
//!
//! `RUST_LOG` wins when set. Otherwise the filter is built from
//! [`LoggingConfig::directives`]: a base level for dependencies and a separate
//! level for this crate's claim, poll and store events.

use std::env;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logging output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

/// Logging output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for dependencies
    pub level: Level,
    /// Level for `mintclaim` targets
    pub crate_level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            crate_level: Level::DEBUG,
            format: LogFormat::Human,
            output: LogOutput::Stdout,
        }
    }
}

impl LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset
    ///
    /// The HTTP stack is capped at `info` so request internals never drown
    /// out claim events.
    pub fn directives(&self) -> String {
        let http = self.level.min(Level::INFO);
        format!(
            "{},mintclaim={},hyper={},reqwest={}",
            self.level.as_str().to_lowercase(),
            self.crate_level.as_str().to_lowercase(),
            http.as_str().to_lowercase(),
            http.as_str().to_lowercase()
        )
    }
}

/// Initialize structured logging with the given configuration
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directives = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.directives());
    let registry = tracing_subscriber::registry().with(EnvFilter::builder().parse_lossy(directives));

    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match config.format {
        LogFormat::Human => registry.with(layer).try_init()?,
        LogFormat::Json => registry
            .with(layer.json().with_span_events(fmt::format::FmtSpan::CLOSE))
            .try_init()?,
    }

    Ok(())
}

/// Read logging settings from `MINTCLAIM_LOG_*` variables
///
/// `MINTCLAIM_LOG_LEVEL` sets the crate level; dependencies stay at `info`.
pub fn config_from_env() -> LoggingConfig {
    let defaults = LoggingConfig::default();
    let crate_level = env::var("MINTCLAIM_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(defaults.crate_level);

    let format = match env::var("MINTCLAIM_LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Human,
    };

    let output = match env::var("MINTCLAIM_LOG_OUTPUT").as_deref() {
        Ok("stderr") => LogOutput::Stderr,
        _ => LogOutput::Stdout,
    };

    LoggingConfig {
        crate_level,
        format,
        output,
        ..defaults
    }
}

/// Initialize logging with environment-based configuration
pub fn init_from_env() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging(config_from_env())
}
