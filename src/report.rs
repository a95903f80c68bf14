//! Append-only timing report.
//!
//! ```text
//! # n-chan/read, data len(hr), nproc, nbytes, read time
//! 1, 1.0, 1, 230400, 0.412
//! 8192, 1.0, 16, 1887436800, 12.907
//! ```
//!
//! The header is written only when the file is created. Every line is flushed as
//! soon as it is written, so an interrupted sweep keeps all completed trials.

use crate::error::{AppResult, ProfileError};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Header line written to a fresh report, without the newline.
pub const REPORT_HEADER: &str = "# n-chan/read, data len(hr), nproc, nbytes, read time";

/// Measurement from one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialResult {
    /// Channels read
    pub n_channels: usize,
    /// Span read, in hours
    pub hours: f64,
    /// Process count handed to the source
    pub nproc: usize,
    /// Total bytes returned
    pub nbytes: u64,
    /// Wall-clock seconds spent in the retrieval call
    pub elapsed_secs: f64,
}

impl TrialResult {
    /// Span of `[start, end)` in hours.
    pub fn hours_between(start: i64, end: i64) -> f64 {
        (i128::from(end) - i128::from(start)) as f64 / 3600.0
    }
}

impl fmt::Display for TrialResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {:.1}, {}, {}, {:.3}",
            self.n_channels, self.hours, self.nproc, self.nbytes, self.elapsed_secs
        )
    }
}

/// Open report file. Flushed after every line and on drop.
#[derive(Debug)]
pub struct ReportFile {
    path: PathBuf,
    writer: BufWriter<File>,
    created: bool,
}

impl ReportFile {
    /// Open `path` for appending, creating it with the header if it does not exist.
    pub fn open(path: &Path) -> AppResult<Self> {
        let report_err = |source| ProfileError::ReportFile {
            path: path.to_path_buf(),
            source,
        };

        let (file, created) = match OpenOptions::new().append(true).create_new(true).open(path) {
            Ok(file) => (file, true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new()
                    .append(true)
                    .open(path)
                    .map_err(report_err)?;
                (file, false)
            }
            Err(e) => return Err(report_err(e)),
        };

        let mut report = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            created,
        };
        if created {
            report.write_line(REPORT_HEADER)?;
        }
        Ok(report)
    }

    /// True if this open created the file (and wrote the header).
    pub fn created(&self) -> bool {
        self.created
    }

    /// Report path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one trial line and flush it.
    pub fn append(&mut self, result: &TrialResult) -> AppResult<()> {
        self.write_line(&result.to_string())
    }

    fn write_line(&mut self, line: &str) -> AppResult<()> {
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|source| ProfileError::ReportFile {
                path: self.path.clone(),
                source,
            })
    }
}
