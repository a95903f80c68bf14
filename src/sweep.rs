//! Sweep driver - state machine over the trial grid
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  prime   ┌────────┐  grid   ┌──────────┐  exhausted  ┌──────┐
//! │ Init │─────────▶│ Primed │────────▶│ Sweeping │────────────▶│ Done │
//! └──────┘          └────────┘         └──────────┘             └──────┘
//! ```
//!
//! `Init` loads the channel list and opens the report. `Primed` runs one
//! single-channel, single-process warm-up over the full requested span so that
//! connection and cache setup do not land in the first measured trial. `Sweeping`
//! walks channel count, then process count, then span. Any error ends the sweep
//! immediately; lines already written stay in the report.

use crate::channels::ChannelList;
use crate::config::{HarnessConfig, SweepConfig};
use crate::error::AppResult;
use crate::report::{ReportFile, REPORT_HEADER};
use crate::source::DataSource;
use crate::trace::TraceCollector;
use crate::trial::{TrialParams, TrialRunner};
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Sweep state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Channel list loaded, report open
    Init,
    /// Warm-up trial done
    Primed,
    /// Walking the grid
    Sweeping,
    /// Every combination measured
    Done,
}

impl std::fmt::Display for SweepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepState::Init => write!(f, "init"),
            SweepState::Primed => write!(f, "primed"),
            SweepState::Sweeping => write!(f, "sweeping"),
            SweepState::Done => write!(f, "done"),
        }
    }
}

/// Grid point, independent of the channel list it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialSpec {
    /// Leading channels to read
    pub n_channels: usize,
    /// Start GPS time
    pub start: i64,
    /// End GPS time
    pub end: i64,
    /// Process count
    pub nproc: usize,
}

impl TrialSpec {
    /// Warm-up trial: first channel, one process, full span.
    pub fn priming(start: i64, end: i64) -> Self {
        Self {
            n_channels: 1,
            start,
            end,
            nproc: 1,
        }
    }
}

/// Expand the grid for `available` loaded channels.
///
/// Returns the trials in run order and the channel targets that were skipped.
pub fn plan_grid(sweep: &SweepConfig, available: usize, start: i64) -> (Vec<TrialSpec>, Vec<usize>) {
    let mut trials = Vec::new();
    let mut skipped = Vec::new();
    let hours = sweep.hours.values();

    for &n_channels in &sweep.channel_counts {
        if n_channels > available {
            skipped.push(n_channels);
            continue;
        }
        for nproc in sweep.process_counts.values_for(n_channels) {
            for &hrs in &hours {
                trials.push(TrialSpec {
                    n_channels,
                    start,
                    end: start.saturating_add(i64::from(hrs) * 3600),
                    nproc,
                });
            }
        }
    }
    (trials, skipped)
}

/// Live view of a sweep, shared with the trace collector.
#[derive(Debug, Clone)]
pub struct SweepProgress {
    /// Current state
    pub state: SweepState,
    /// Trials finished, warm-up included
    pub trials_completed: usize,
    /// Trials planned, warm-up included
    pub trials_planned: usize,
    /// Trial in flight
    pub current: Option<TrialSpec>,
    /// When the sweep started
    pub started: DateTime<Local>,
}

impl Default for SweepProgress {
    fn default() -> Self {
        Self {
            state: SweepState::Init,
            trials_completed: 0,
            trials_planned: 0,
            current: None,
            started: Local::now(),
        }
    }
}

/// Handle to the progress shared with the trace collector.
pub type SharedProgress = Arc<Mutex<SweepProgress>>;

/// What a finished sweep did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    /// Trials run, warm-up included
    pub trials: usize,
    /// Channel targets above the loaded channel count
    pub skipped_targets: Vec<usize>,
}

/// Drives one sweep from `Init` to `Done`.
pub struct SweepDriver<S: DataSource> {
    config: HarnessConfig,
    channels: ChannelList,
    report: ReportFile,
    source: S,
    progress: SharedProgress,
}

impl<S: DataSource> SweepDriver<S> {
    /// Load the channel list and open the report.
    pub fn init(config: HarnessConfig, source: S) -> AppResult<Self> {
        let channels = ChannelList::load(&config.chan_list)?;
        let report = ReportFile::open(&config.out)?;
        info!("{REPORT_HEADER}");
        info!(
            channels = channels.len(),
            report = %report.path().display(),
            created = report.created(),
            "Sweep initialised"
        );
        Ok(Self {
            config,
            channels,
            report,
            source,
            progress: SharedProgress::default(),
        })
    }

    /// Progress handle, for observers.
    pub fn progress(&self) -> SharedProgress {
        Arc::clone(&self.progress)
    }

    /// Run the warm-up and the grid.
    ///
    /// The trace collector, when enabled, runs for the whole call and is stopped
    /// on every exit path.
    pub fn run(mut self) -> AppResult<SweepSummary> {
        let trace = &self.config.sweep.trace;
        let collector = if trace.enabled {
            Some(TraceCollector::start(
                trace.path.clone(),
                trace.interval,
                self.progress(),
            )?)
        } else {
            None
        };

        let outcome = self.sweep();
        if let Some(collector) = collector {
            collector.stop();
        }
        outcome
    }

    fn sweep(&mut self) -> AppResult<SweepSummary> {
        let (start, end) = (self.config.start, self.config.end);
        let (grid, skipped_targets) = plan_grid(&self.config.sweep, self.channels.len(), start);
        for target in &skipped_targets {
            info!(
                channel_target = *target,
                available = self.channels.len(),
                "Skipping channel target above loaded channel count"
            );
        }

        let priming = self.config.sweep.prime.then(|| TrialSpec::priming(start, end));
        self.update(|p| p.trials_planned = grid.len() + usize::from(priming.is_some()));

        let mut runner = TrialRunner::new(&self.source, &mut self.report, self.config.verbose);
        let mut trials = 0;

        if let Some(spec) = priming {
            if self.channels.is_empty() {
                warn!("Channel list is empty; priming with no channels");
            }
            run_spec(&mut runner, &self.channels, &self.progress, &spec)?;
            trials += 1;
        }
        set_state(&self.progress, SweepState::Primed);

        set_state(&self.progress, SweepState::Sweeping);
        for spec in &grid {
            run_spec(&mut runner, &self.channels, &self.progress, spec)?;
            trials += 1;
        }

        set_state(&self.progress, SweepState::Done);
        info!(trials, "Sweep complete");
        Ok(SweepSummary {
            trials,
            skipped_targets,
        })
    }

    fn update(&self, f: impl FnOnce(&mut SweepProgress)) {
        update(&self.progress, f);
    }
}

fn update(progress: &SharedProgress, f: impl FnOnce(&mut SweepProgress)) {
    let mut guard = progress.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard);
}

fn set_state(progress: &SharedProgress, state: SweepState) {
    debug!(%state, "Sweep state change");
    update(progress, |p| p.state = state);
}

fn run_spec<S: DataSource + ?Sized>(
    runner: &mut TrialRunner<'_, S>,
    channels: &ChannelList,
    progress: &SharedProgress,
    spec: &TrialSpec,
) -> AppResult<()> {
    update(progress, |p| p.current = Some(*spec));
    runner.run(&TrialParams {
        channels: channels.prefix(spec.n_channels),
        start: spec.start,
        end: spec.end,
        nproc: spec.nproc,
    })?;
    update(progress, |p| {
        p.current = None;
        p.trials_completed += 1;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HourRange, ProcessGrid};

    fn small_sweep(channel_counts: Vec<usize>) -> SweepConfig {
        SweepConfig {
            channel_counts,
            process_counts: ProcessGrid::Fixed { values: vec![1, 2] },
            hours: HourRange {
                start: 1,
                end: 3,
                step: 1,
            },
            ..SweepConfig::variant_b()
        }
    }

    #[test]
    fn grid_order_is_channels_then_nproc_then_hours() {
        let (trials, skipped) = plan_grid(&small_sweep(vec![2]), 3, 1000);
        assert!(skipped.is_empty());
        let order: Vec<(usize, usize, i64)> = trials
            .iter()
            .map(|t| (t.n_channels, t.nproc, t.end - t.start))
            .collect();
        assert_eq!(
            order,
            vec![(2, 1, 3600), (2, 1, 7200), (2, 2, 3600), (2, 2, 7200)]
        );
        assert!(trials.iter().all(|t| t.start == 1000));
    }

    #[test]
    fn targets_above_available_are_skipped() {
        let (trials, skipped) = plan_grid(&small_sweep(vec![2, 4]), 3, 0);
        assert_eq!(skipped, vec![4]);
        assert!(trials.iter().all(|t| t.n_channels == 2));
    }

    #[test]
    fn derived_process_counts_follow_channel_count() {
        let sweep = SweepConfig {
            process_counts: ProcessGrid::Derived { upper_bound: 3 },
            ..small_sweep(vec![2, 4])
        };
        let (trials, _) = plan_grid(&sweep, 4, 0);
        let nprocs: Vec<(usize, usize)> = trials.iter().map(|t| (t.n_channels, t.nproc)).collect();
        // 2 channels -> 1..2, 4 channels -> 1..3; two spans each
        assert_eq!(nprocs, vec![(2, 1), (2, 1), (4, 1), (4, 1), (4, 2), (4, 2)]);
    }

    #[test]
    fn spans_near_gps_limit_saturate() {
        let (trials, _) = plan_grid(&small_sweep(vec![2]), 3, i64::MAX - 10);
        assert!(trials.iter().all(|t| t.end == i64::MAX));
    }

    #[test]
    fn priming_trial_uses_one_channel_and_one_process() {
        let spec = TrialSpec::priming(1_000_000_000, 1_000_003_600);
        assert_eq!(spec.n_channels, 1);
        assert_eq!(spec.nproc, 1);
        assert_eq!(spec.end - spec.start, 3600);
    }

    #[test]
    fn state_display() {
        assert_eq!(SweepState::Sweeping.to_string(), "sweeping");
        assert_eq!(SweepState::Done.to_string(), "done");
    }
}
