//! Single timed retrieval.

use crate::error::AppResult;
use crate::report::{ReportFile, TrialResult};
use crate::source::{total_bytes, DataRequest, DataSource};
use std::time::Instant;
use tracing::info;

/// Inputs of one trial.
#[derive(Debug, Clone, Copy)]
pub struct TrialParams<'a> {
    /// Channels to read
    pub channels: &'a [String],
    /// Start GPS time
    pub start: i64,
    /// End GPS time
    pub end: i64,
    /// Process count handed to the source
    pub nproc: usize,
}

/// Times retrieval calls and records each one in the report.
pub struct TrialRunner<'a, S: DataSource + ?Sized> {
    source: &'a S,
    report: &'a mut ReportFile,
    verbose: bool,
}

impl<'a, S: DataSource + ?Sized> TrialRunner<'a, S> {
    /// Runner reading from `source` and appending to `report`.
    pub fn new(source: &'a S, report: &'a mut ReportFile, verbose: bool) -> Self {
        Self {
            source,
            report,
            verbose,
        }
    }

    /// Run one trial: time the retrieval, size the result, append and log the line.
    ///
    /// Retrieval errors are returned untouched; nothing is written for a failed trial.
    pub fn run(&mut self, params: &TrialParams<'_>) -> AppResult<TrialResult> {
        let request = DataRequest {
            channels: params.channels,
            start: params.start,
            end: params.end,
            nproc: params.nproc,
            verbose: self.verbose,
        };

        let started = Instant::now();
        let data = self.source.get_data(&request)?;
        let elapsed_secs = started.elapsed().as_secs_f64();

        let result = TrialResult {
            n_channels: params.channels.len(),
            hours: TrialResult::hours_between(params.start, params.end),
            nproc: params.nproc,
            nbytes: total_bytes(&data),
            elapsed_secs,
        };
        self.report.append(&result)?;
        info!(
            n_channels = result.n_channels,
            hours = result.hours,
            nproc = result.nproc,
            nbytes = result.nbytes,
            elapsed_s = result.elapsed_secs,
            "{result}"
        );
        Ok(result)
    }
}
