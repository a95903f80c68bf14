//! Tracing setup for the profiler binary.
//!
//! Trial lines, state changes and retrieval progress are all emitted through
//! `tracing`. This module installs the subscriber:
//! - Environment-based filtering (`RUST_LOG` wins over the configured level)
//! - Pretty, compact or JSON output on stderr
//!
//! # Example
//! ```no_run
//! use frame_profiler::logging::{self, OutputFormat, TracingConfig};
//! use tracing::Level;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init(TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Compact))?;
//! tracing::info!("sweep starting");
//! # Ok(())
//! # }
//! ```

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed format with colors
    Pretty,
    /// Single-line format without colors
    #[default]
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to include thread names
    pub with_thread_names: bool,
    /// Whether to enable ANSI colors (only for Pretty format)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_file_and_line: false,
            with_thread_names: true,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Create tracing config with custom level
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Create tracing config from a level name
    pub fn from_level_name(level: &str) -> Result<Self, String> {
        Ok(Self::new(parse_log_level(level)?))
    }

    /// Set output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install the global subscriber.
///
/// Idempotent: if a subscriber is already installed this returns `Ok(())`, which
/// keeps tests that initialise logging more than once happy.
pub fn init(config: TracingConfig) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let fmt_layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_ansi(config.with_ansi)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_ansi(false)
            .boxed(),
        OutputFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            if e.to_string()
                .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(format!("Failed to initialize tracing: {}", e))
            }
        })
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}
