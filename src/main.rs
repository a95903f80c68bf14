//! CLI entry point for the frame read profiler
//!
//! Generates timing data for reading frame data: a warm-up read, then one read per
//! (channel count, process count, span) combination, each appended to the report.
//!
//! # Usage
//!
//! ```bash
//! profile-get-data -c H1.lcf -C channels.txt -o timing.csv -s 1000000000 -e 1000003600
//! profile-get-data --variant b --backend mock -c unused -C channels.txt -o timing.csv \
//!     -s 1000000000 -e 1000003600
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use frame_profiler::config::{Backend, HarnessConfig, SweepConfig, Variant};
use frame_profiler::logging::{self, OutputFormat, TracingConfig};
use frame_profiler::source;
use frame_profiler::sweep::SweepDriver;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "profile-get-data")]
#[command(about = "Generate timing data for reading frame data", long_about = None)]
struct Cli {
    /// Frame cache file handed to the retrieval call
    #[arg(short = 'c', long, required_unless_present = "dump_config")]
    cache: Option<PathBuf>,

    /// List of channels in frames, one per line
    #[arg(short = 'C', long = "chan-list", required_unless_present = "dump_config")]
    chan_list: Option<PathBuf>,

    /// Output file (appended to)
    #[arg(short = 'o', long, required_unless_present = "dump_config")]
    out: Option<PathBuf>,

    /// Start GPS
    #[arg(
        short = 's',
        long,
        allow_negative_numbers = true,
        required_unless_present = "dump_config"
    )]
    start: Option<i64>,

    /// End GPS (span of the warm-up read)
    #[arg(
        short = 'e',
        long,
        allow_negative_numbers = true,
        required_unless_present = "dump_config"
    )]
    end: Option<i64>,

    /// Sweep layout preset
    #[arg(long, value_enum, default_value_t = Variant::A)]
    variant: Variant,

    /// TOML file overriding the preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Retrieval implementation
    #[arg(long, value_enum, default_value_t = Backend::Cache)]
    backend: Backend,

    /// Ask the retrieval call to report progress
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
    log_format: OutputFormat,

    /// Disable the trace collector regardless of preset
    #[arg(long)]
    no_trace: bool,

    /// Print the effective sweep configuration as TOML and exit; run flags are not needed
    #[arg(long)]
    dump_config: bool,
}

impl Cli {
    /// Run configuration from the parsed flags and the loaded sweep.
    fn harness_config(self, sweep: SweepConfig) -> Result<HarnessConfig> {
        let (Some(cache), Some(chan_list), Some(out), Some(start), Some(end)) =
            (self.cache, self.chan_list, self.out, self.start, self.end)
        else {
            bail!("--cache, --chan-list, --out, --start and --end are required");
        };
        Ok(HarnessConfig {
            cache,
            chan_list,
            out,
            start,
            end,
            verbose: self.verbose,
            backend: self.backend,
            sweep,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let tracing_config = TracingConfig::from_level_name(&cli.log_level)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format);
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    let mut sweep = SweepConfig::load(cli.variant, cli.config.as_deref())
        .context("Failed to load sweep configuration")?;
    if cli.no_trace {
        sweep.trace.enabled = false;
    }

    if cli.dump_config {
        print!("{}", toml::to_string_pretty(&sweep)?);
        return Ok(());
    }
    debug!(sweep = %serde_json::to_string(&sweep)?, "Effective sweep configuration");

    let config = cli.harness_config(sweep)?;
    config.validate()?;

    let source = source::open_source(config.backend, &config.cache, &config.sweep.mock)
        .with_context(|| format!("Failed to open data source '{}'", config.cache.display()))?;
    let driver = SweepDriver::init(config, source)?;
    let summary = driver.run()?;

    info!(
        trials = summary.trials,
        skipped = ?summary.skipped_targets,
        "Profiling finished"
    );
    Ok(())
}
