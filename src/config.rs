//! Sweep configuration using Figment
//!
//! Both historical sweep layouts are expressed as presets of one value object,
//! [`SweepConfig`]. A preset is loaded first, then overridden by:
//! 1. an optional TOML file passed with `--config`
//! 2. environment variables prefixed with `PROFILE_GET_DATA_` (nested keys split on `__`)
//!
//! # Example
//! ```no_run
//! use frame_profiler::config::{SweepConfig, Variant};
//!
//! let sweep = SweepConfig::load(Variant::A, Some("sweep.toml".as_ref()))?;
//! println!("channel targets: {:?}", sweep.channel_counts);
//! # Ok::<(), frame_profiler::error::ProfileError>(())
//! ```

use crate::error::{AppResult, ProfileError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix for sweep overrides.
pub const ENV_PREFIX: &str = "PROFILE_GET_DATA_";

/// Built-in sweep layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Variant {
    /// Large channel counts, every CPU, strided spans, trace collector on.
    #[default]
    A,
    /// Small channel counts, process count derived from channel count, short spans.
    B,
}

/// Which retrieval implementation backs the trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Read frame files listed in the cache.
    #[default]
    Cache,
    /// Generate synthetic samples.
    Mock,
}

/// Everything one harness run needs, passed explicitly to the sweep.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Source reference handed to the retrieval call.
    pub cache: PathBuf,
    /// Newline-delimited channel names.
    pub chan_list: PathBuf,
    /// Append-only report file.
    pub out: PathBuf,
    /// Sweep start GPS time.
    pub start: i64,
    /// End GPS time of the priming trial.
    pub end: i64,
    /// Verbosity flag forwarded to the retrieval call.
    pub verbose: bool,
    /// Retrieval implementation.
    pub backend: Backend,
    /// Grid definitions and collaborators.
    pub sweep: SweepConfig,
}

impl HarnessConfig {
    /// Validate the run parameters and the embedded sweep.
    pub fn validate(&self) -> AppResult<()> {
        if self.end <= self.start {
            return Err(ProfileError::Configuration(format!(
                "end ({}) must be after start ({})",
                self.end, self.start
            )));
        }
        if self.end.checked_sub(self.start).is_none() {
            return Err(ProfileError::Configuration(format!(
                "span from {} to {} is out of range",
                self.start, self.end
            )));
        }
        let longest = i64::from(self.sweep.hours.end) * 3600;
        if self.start.checked_add(longest).is_none() {
            return Err(ProfileError::Configuration(format!(
                "start ({}) plus the longest span ({} h) is out of range",
                self.start, self.sweep.hours.end
            )));
        }
        self.sweep.validate()
    }
}

/// Grid definitions, priming policy and trace toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Ascending channel-count targets; targets above the loaded count are skipped
    pub channel_counts: Vec<usize>,
    /// Run one single-channel warm-up trial before the grid
    #[serde(default = "default_prime")]
    pub prime: bool,
    /// Process counts tried for each channel-count target
    pub process_counts: ProcessGrid,
    /// Read spans in hours
    pub hours: HourRange,
    /// Diagnostic trace collector
    pub trace: TraceConfig,
    /// Mock backend settings
    #[serde(default)]
    pub mock: MockConfig,
}

/// Process-count axis of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessGrid {
    /// The same list for every channel count.
    Fixed {
        /// Process counts, in iteration order.
        values: Vec<usize>,
    },
    /// `1..min(channel_count, upper_bound)`, half-open.
    Derived {
        /// Exclusive upper bound on the process count.
        upper_bound: usize,
    },
}

impl ProcessGrid {
    /// Process counts to try for `n_channels` channels.
    pub fn values_for(&self, n_channels: usize) -> Vec<usize> {
        match self {
            ProcessGrid::Fixed { values } => values.clone(),
            ProcessGrid::Derived { upper_bound } => (1..n_channels.min(*upper_bound)).collect(),
        }
    }
}

/// Half-open stride range of read spans, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    /// First span
    pub start: u32,
    /// Exclusive end
    pub end: u32,
    /// Stride between spans
    #[serde(default = "default_step")]
    pub step: u32,
}

impl HourRange {
    /// Spans in iteration order.
    pub fn values(&self) -> Vec<u32> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.start..self.end).step_by(self.step as usize).collect()
    }
}

/// Diagnostic trace collector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Whether the collector runs during the sweep
    pub enabled: bool,
    /// HTML report rewritten by the collector
    pub path: PathBuf,
    /// Time between report rewrites
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Synthetic source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Samples generated per channel per second of span
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate(),
        }
    }
}

// Default value functions
fn default_prime() -> bool {
    true
}

fn default_step() -> u32 {
    1
}

fn default_sample_rate() -> f64 {
    16.0
}

fn default_trace_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join("public_html")
        .join("get-data-trace.html")
}

/// Number of CPUs available to this process, at least 1.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl SweepConfig {
    /// Large-read sweep: every CPU, spans of 1 to 25 hours in 4 hour strides.
    pub fn variant_a() -> Self {
        Self {
            channel_counts: vec![8192, 16384, 32768, 65536, 131072],
            process_counts: ProcessGrid::Fixed {
                values: vec![cpu_count()],
            },
            hours: HourRange {
                start: 1,
                end: 28,
                step: 4,
            },
            prime: true,
            trace: TraceConfig {
                enabled: true,
                path: default_trace_path(),
                interval: Duration::from_secs(5),
            },
            mock: MockConfig::default(),
        }
    }

    /// Scaling sweep: process count grows with channel count, spans of 1 to 4 hours.
    pub fn variant_b() -> Self {
        Self {
            channel_counts: vec![2, 4, 8, 16, 32, 64, 128],
            process_counts: ProcessGrid::Derived {
                upper_bound: cpu_count() + 1,
            },
            hours: HourRange {
                start: 1,
                end: 5,
                step: 1,
            },
            prime: true,
            trace: TraceConfig {
                enabled: false,
                path: default_trace_path(),
                interval: Duration::from_secs(5),
            },
            mock: MockConfig::default(),
        }
    }

    /// Preset for `variant`.
    pub fn preset(variant: Variant) -> Self {
        match variant {
            Variant::A => Self::variant_a(),
            Variant::B => Self::variant_b(),
        }
    }

    /// Load the preset for `variant`, then merge an optional TOML file and the environment.
    pub fn load(variant: Variant, file: Option<&Path>) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::preset(variant)));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        if self.channel_counts.is_empty() {
            return Err(ProfileError::Configuration(
                "channel_counts must not be empty".to_string(),
            ));
        }
        if self.channel_counts.contains(&0) {
            return Err(ProfileError::Configuration(
                "channel_counts must be positive".to_string(),
            ));
        }

        match &self.process_counts {
            ProcessGrid::Fixed { values } => {
                if values.is_empty() || values.contains(&0) {
                    return Err(ProfileError::Configuration(
                        "process_counts.values must be a non-empty list of positive counts"
                            .to_string(),
                    ));
                }
            }
            ProcessGrid::Derived { upper_bound } => {
                if *upper_bound == 0 {
                    return Err(ProfileError::Configuration(
                        "process_counts.upper_bound must be positive".to_string(),
                    ));
                }
            }
        }

        if self.hours.step == 0 {
            return Err(ProfileError::Configuration(
                "hours.step must be positive".to_string(),
            ));
        }
        if self.hours.values().is_empty() {
            return Err(ProfileError::Configuration(format!(
                "hours range {}..{} is empty",
                self.hours.start, self.hours.end
            )));
        }

        if self.trace.enabled && self.trace.interval.is_zero() {
            return Err(ProfileError::Configuration(
                "trace.interval must be non-zero".to_string(),
            ));
        }

        if !(self.mock.sample_rate_hz.is_finite() && self.mock.sample_rate_hz > 0.0) {
            return Err(ProfileError::Configuration(format!(
                "mock.sample_rate_hz must be positive and finite, got {}",
                self.mock.sample_rate_hz
            )));
        }

        Ok(())
    }
}
