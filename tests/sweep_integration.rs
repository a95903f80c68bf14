//! End-to-end sweeps through the library API.
//!
//! These tests drive `SweepDriver` against in-memory sources and real frame files
//! in a temp directory, then inspect the report that comes out.

use frame_profiler::config::{Backend, HarnessConfig, HourRange, ProcessGrid, SweepConfig};
use frame_profiler::error::{AppResult, ProfileError};
use frame_profiler::report::REPORT_HEADER;
use frame_profiler::source::{
    ChannelBuffer, DataMap, DataRequest, DataSource, FrameCacheSource, MockSource,
};
use frame_profiler::sweep::SweepDriver;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

// =============================================================================
// Helpers
// =============================================================================

/// 100 four-byte samples per channel; records (channels, span seconds, nproc).
#[derive(Default)]
struct RecordingSource {
    calls: RefCell<Vec<(Vec<String>, i64, usize)>>,
}

impl DataSource for RecordingSource {
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap> {
        self.calls.borrow_mut().push((
            request.channels.to_vec(),
            request.end - request.start,
            request.nproc,
        ));
        Ok(request
            .channels
            .iter()
            .map(|c| (c.clone(), ChannelBuffer::F32(vec![0.0; 100])))
            .collect())
    }
}

impl DataSource for &RecordingSource {
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap> {
        (**self).get_data(request)
    }
}

/// Succeeds `remaining` times, then fails every call.
struct FlakySource {
    remaining: Cell<usize>,
}

impl DataSource for FlakySource {
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap> {
        if self.remaining.get() == 0 {
            return Err(ProfileError::MissingData {
                start: request.start,
                end: request.end,
            });
        }
        self.remaining.set(self.remaining.get() - 1);
        Ok(DataMap::new())
    }
}

fn write_channels(dir: &Path, names: &[&str]) -> PathBuf {
    let path = dir.join("channels.txt");
    let mut text = names.join("\n");
    text.push('\n');
    std::fs::write(&path, text).unwrap();
    path
}

fn sweep(channel_counts: Vec<usize>) -> SweepConfig {
    let mut sweep = SweepConfig::variant_b();
    sweep.channel_counts = channel_counts;
    sweep.process_counts = ProcessGrid::Fixed { values: vec![1] };
    sweep.hours = HourRange {
        start: 1,
        end: 2,
        step: 1,
    };
    sweep.trace.enabled = false;
    sweep
}

fn harness(dir: &Path, chan_list: PathBuf, sweep: SweepConfig) -> HarnessConfig {
    HarnessConfig {
        cache: dir.join("cache.lcf"),
        chan_list,
        out: dir.join("timing.csv"),
        start: 1_000_000_000,
        end: 1_000_003_600,
        verbose: false,
        backend: Backend::Mock,
        sweep,
    }
}

fn report_lines(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("timing.csv"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn priming_reads_first_channel_with_one_process() {
    let dir = tempfile::tempdir().unwrap();
    let chans = write_channels(dir.path(), &["H1:CHAN1", "H1:CHAN2", "H1:CHAN3"]);
    let source = RecordingSource::default();

    let summary = SweepDriver::init(harness(dir.path(), chans, sweep(vec![2, 4])), &source)
        .unwrap()
        .run()
        .unwrap();

    let calls = source.calls.borrow();
    assert_eq!(calls[0], (vec!["H1:CHAN1".to_string()], 3600, 1));
    assert_eq!(summary.trials, 2);
    assert_eq!(summary.skipped_targets, vec![4]);

    let lines = report_lines(dir.path());
    assert_eq!(lines[0], REPORT_HEADER);
    assert!(lines[1].starts_with("1, 1.0, 1, 400, "));
    assert!(lines[2].starts_with("2, 1.0, 1, 800, "));
    assert_eq!(lines.len(), 3);
}

#[test]
fn grid_spans_start_at_sweep_start() {
    let dir = tempfile::tempdir().unwrap();
    let chans = write_channels(dir.path(), &["A", "B", "C", "D"]);
    let source = RecordingSource::default();

    let mut config = sweep(vec![1, 4]);
    config.process_counts = ProcessGrid::Fixed { values: vec![1, 2] };
    config.hours = HourRange {
        start: 1,
        end: 28,
        step: 4,
    };
    SweepDriver::init(harness(dir.path(), chans, config), &source)
        .unwrap()
        .run()
        .unwrap();

    let calls = source.calls.borrow();
    // warm-up + 2 targets * 2 nprocs * 7 spans
    assert_eq!(calls.len(), 1 + 2 * 2 * 7);
    let spans: Vec<i64> = calls[1..8].iter().map(|c| c.1 / 3600).collect();
    assert_eq!(spans, vec![1, 5, 9, 13, 17, 21, 25]);
    assert_eq!(calls.last().unwrap().0.len(), 4);
    assert_eq!(calls.last().unwrap().2, 2);
}

#[test]
fn second_run_appends_without_repeating_header() {
    let dir = tempfile::tempdir().unwrap();
    let chans = write_channels(dir.path(), &["H1:CHAN1", "H1:CHAN2"]);

    for _ in 0..2 {
        SweepDriver::init(
            harness(dir.path(), chans.clone(), sweep(vec![2])),
            MockSource::new(1.0),
        )
        .unwrap()
        .run()
        .unwrap();
    }

    let lines = report_lines(dir.path());
    assert_eq!(lines.iter().filter(|l| *l == REPORT_HEADER).count(), 1);
    assert_eq!(lines.len(), 1 + 2 * 2);
    // 3600 s at 1 Hz, 4 bytes per sample
    assert!(lines[1].starts_with("1, 1.0, 1, 14400, "));
    assert!(lines[2].starts_with("2, 1.0, 1, 28800, "));
}

#[test]
fn failure_keeps_lines_already_written() {
    let dir = tempfile::tempdir().unwrap();
    let chans = write_channels(dir.path(), &["A", "B"]);
    let mut config = sweep(vec![1, 2]);
    config.hours = HourRange {
        start: 1,
        end: 4,
        step: 1,
    };

    let err = SweepDriver::init(
        harness(dir.path(), chans, config),
        FlakySource {
            remaining: Cell::new(2),
        },
    )
    .unwrap()
    .run()
    .unwrap_err();
    assert!(matches!(err, ProfileError::MissingData { .. }));

    let lines = report_lines(dir.path());
    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with("1, 1.0, 1, 0, "));
}

#[test]
fn missing_channel_list_fails_at_init() {
    let dir = tempfile::tempdir().unwrap();
    let result = SweepDriver::init(
        harness(dir.path(), dir.path().join("nope.txt"), sweep(vec![1])),
        MockSource::default(),
    );
    assert!(matches!(result, Err(ProfileError::ChannelList { .. })));
    assert!(!dir.path().join("timing.csv").exists());
}

#[test]
fn trace_collector_writes_report_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let chans = write_channels(dir.path(), &["A"]);
    let mut config = sweep(vec![1]);
    config.trace.enabled = true;
    config.trace.path = dir.path().join("trace.html");

    SweepDriver::init(harness(dir.path(), chans, config), MockSource::new(1.0))
        .unwrap()
        .run()
        .unwrap();

    let html = std::fs::read_to_string(dir.path().join("trace.html")).unwrap();
    assert!(html.contains("state:     done"));
    assert!(html.contains("trials:    2 / 2"));
}

#[test]
fn frame_cache_sweep_reports_f64_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let chans = write_channels(dir.path(), &["H1:A", "H1:B"]);

    // two one-hour frames sampled at 1 Hz
    let mut cache = String::new();
    for i in 0..2i64 {
        let start = 1_000_000_000 + i * 3600;
        let path = dir.path().join(format!("H-H1_T-{start}-3600.csv"));
        let mut csv = String::from("gps,H1:A,H1:B\n");
        for t in start..start + 3600 {
            csv.push_str(&format!("{t},1.0,2.0\n"));
        }
        std::fs::write(&path, csv).unwrap();
        cache.push_str(&format!("H H1_T {start} 3600 {}\n", path.display()));
    }
    let cache_path = dir.path().join("cache.lcf");
    std::fs::write(&cache_path, cache).unwrap();

    let mut config = sweep(vec![2]);
    config.process_counts = ProcessGrid::Fixed { values: vec![2] };
    config.hours = HourRange {
        start: 2,
        end: 3,
        step: 1,
    };
    let source = FrameCacheSource::open(&cache_path).unwrap();
    SweepDriver::init(harness(dir.path(), chans, config), source)
        .unwrap()
        .run()
        .unwrap();

    let lines = report_lines(dir.path());
    assert!(lines[1].starts_with("1, 1.0, 1, 28800, "));
    assert!(lines[2].starts_with("2, 2.0, 2, 115200, "));
}
