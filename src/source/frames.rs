//! Cache-backed frame reader.
//!
//! Frame files are CSV with a `gps` column followed by one column per channel:
//!
//! ```text
//! gps,H1:CHAN1,H1:CHAN2
//! 1000000000.0,0.12,-3.5
//! 1000000000.0625,0.11,-3.4
//! ```
//!
//! The frame files covering a request are split into `nproc` contiguous runs, each
//! read on its own scoped thread. Per-channel samples are concatenated in time order.

use super::{partition, CacheEntry, ChannelBuffer, DataMap, DataRequest, DataSource, FrameCache};
use crate::error::{AppResult, ProfileError};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

type Samples = HashMap<String, Vec<f64>>;

/// Reads frame files listed in a frame cache.
#[derive(Debug)]
pub struct FrameCacheSource {
    cache: FrameCache,
}

impl FrameCacheSource {
    /// Load the cache at `path`.
    pub fn open(path: &Path) -> AppResult<Self> {
        let cache = FrameCache::load(path)?;
        info!(
            cache = %path.display(),
            entries = cache.entries().len(),
            "Loaded frame cache"
        );
        Ok(Self { cache })
    }

    /// Wrap an already parsed cache.
    pub fn from_cache(cache: FrameCache) -> Self {
        Self { cache }
    }
}

impl DataSource for FrameCacheSource {
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap> {
        let entries = self.cache.covering(request.start, request.end)?;
        let runs = partition(&entries, request.nproc);
        debug!(
            files = entries.len(),
            workers = runs.len(),
            "Reading frame files"
        );

        let per_run: Vec<AppResult<Samples>> = if runs.len() <= 1 {
            runs.iter().map(|run| read_run(run, request)).collect()
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> = runs
                    .iter()
                    .map(|run| scope.spawn(move || read_run(run, request)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(ProfileError::Worker("frame reader thread panicked".into()))
                        })
                    })
                    .collect()
            })
        };

        let mut merged: Samples = request
            .channels
            .iter()
            .map(|c| (c.clone(), Vec::new()))
            .collect();
        for run in per_run {
            for (channel, samples) in run? {
                if let Some(all) = merged.get_mut(&channel) {
                    all.extend(samples);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(channel, samples)| (channel, ChannelBuffer::F64(samples)))
            .collect())
    }
}

fn read_run(run: &[&CacheEntry], request: &DataRequest<'_>) -> AppResult<Samples> {
    let mut out = Samples::new();
    for entry in run {
        let frame = read_frame(&entry.path, request.channels, request.start, request.end)?;
        let rows = frame.values().next().map_or(0, Vec::len);
        if request.verbose {
            info!(file = %entry.path.display(), rows, "Read frame file");
        } else {
            debug!(file = %entry.path.display(), rows, "Read frame file");
        }
        for (channel, samples) in frame {
            out.entry(channel).or_default().extend(samples);
        }
    }
    Ok(out)
}

/// Read `channels` from one frame file, keeping rows with `start <= gps < end`.
pub fn read_frame(path: &Path, channels: &[String], start: i64, end: i64) -> AppResult<Samples> {
    let format_err = |message: String| ProfileError::FrameFormat {
        file: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let gps_col = headers
        .iter()
        .position(|h| h == "gps")
        .ok_or_else(|| format_err("missing 'gps' column".to_string()))?;

    let mut columns: Vec<(&str, usize)> = Vec::with_capacity(channels.len());
    for channel in channels {
        if columns.iter().any(|(name, _)| *name == channel.as_str()) {
            continue;
        }
        let col = headers
            .iter()
            .position(|h| h == channel.as_str())
            .ok_or_else(|| ProfileError::ChannelNotFound {
                channel: channel.clone(),
                file: path.to_path_buf(),
            })?;
        columns.push((channel.as_str(), col));
    }

    let mut samples: Samples = columns
        .iter()
        .map(|(name, _)| (name.to_string(), Vec::new()))
        .collect();
    let (start, end) = (start as f64, end as f64);

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize| -> AppResult<f64> {
            let raw = record.get(col).unwrap_or("");
            raw.parse::<f64>()
                .map_err(|_| format_err(format!("row {}: invalid number '{raw}'", row + 1)))
        };
        let gps = field(gps_col)?;
        if gps < start || gps >= end {
            continue;
        }
        for (name, col) in &columns {
            let value = field(*col)?;
            if let Some(buf) = samples.get_mut(*name) {
                buf.push(value);
            }
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::total_bytes;
    use std::fmt::Write as _;

    /// Writes `files` one-second-sampled frames of `len` seconds starting at `t0`.
    fn write_frames(dir: &Path, t0: i64, len: i64, files: i64, channels: &[&str]) -> FrameCache {
        let mut cache = String::new();
        for i in 0..files {
            let start = t0 + i * len;
            let path = dir.join(format!("H-H1_TEST-{start}-{len}.csv"));
            let mut csv = format!("gps,{}\n", channels.join(","));
            for t in start..start + len {
                let row: Vec<String> = (0..channels.len())
                    .map(|c| (t * 10 + c as i64).to_string())
                    .collect();
                writeln!(csv, "{t},{}", row.join(",")).unwrap();
            }
            std::fs::write(&path, csv).unwrap();
            writeln!(cache, "H H1_TEST {start} {len} file://{}", path.display()).unwrap();
        }
        FrameCache::parse(&cache, Path::new("mem.lcf")).unwrap()
    }

    fn names(chans: &[&str]) -> Vec<String> {
        chans.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn reads_span_in_time_order_across_workers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = write_frames(dir.path(), 1000, 4, 5, &["H1:A", "H1:B"]);
        let source = FrameCacheSource::from_cache(cache);
        let channels = names(&["H1:A", "H1:B"]);

        let request = DataRequest {
            channels: &channels,
            start: 1002,
            end: 1018,
            nproc: 3,
            verbose: false,
        };
        let data = source.get_data(&request).unwrap();

        let ChannelBuffer::F64(a) = &data["H1:A"] else {
            panic!("expected f64 samples");
        };
        let expected: Vec<f64> = (1002..1018).map(|t| (t * 10) as f64).collect();
        assert_eq!(a, &expected);
        assert_eq!(data["H1:B"].len(), 16);
        assert_eq!(total_bytes(&data), 2 * 16 * 8);
    }

    #[test]
    fn same_result_for_any_process_count() {
        let dir = tempfile::tempdir().unwrap();
        let cache = write_frames(dir.path(), 0, 8, 4, &["X"]);
        let source = FrameCacheSource::from_cache(cache);
        let channels = names(&["X"]);

        let read = |nproc| {
            source
                .get_data(&DataRequest {
                    channels: &channels,
                    start: 0,
                    end: 32,
                    nproc,
                    verbose: true,
                })
                .unwrap()
        };
        assert_eq!(read(1), read(4));
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = write_frames(dir.path(), 0, 4, 1, &["X"]);
        let source = FrameCacheSource::from_cache(cache);
        let channels = names(&["Y"]);

        let err = source
            .get_data(&DataRequest {
                channels: &channels,
                start: 0,
                end: 4,
                nproc: 1,
                verbose: false,
            })
            .unwrap_err();
        assert!(matches!(err, ProfileError::ChannelNotFound { .. }));
    }

    #[test]
    fn uncovered_span_is_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = write_frames(dir.path(), 0, 4, 1, &["X"]);
        let source = FrameCacheSource::from_cache(cache);
        let channels = names(&["X"]);

        let err = source
            .get_data(&DataRequest {
                channels: &channels,
                start: 0,
                end: 3600,
                nproc: 2,
                verbose: false,
            })
            .unwrap_err();
        assert!(matches!(err, ProfileError::MissingData { start: 4, .. }));
    }

    #[test]
    fn malformed_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "gps,X\n0,1.0\n1,abc\n").unwrap();
        let err = read_frame(&path, &names(&["X"]), 0, 2).unwrap_err();
        assert!(err.to_string().contains("invalid number 'abc'"));
    }
}
