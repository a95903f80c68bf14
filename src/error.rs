//! Custom error types for the profiler.
//!
//! This module defines the primary error type, `ProfileError`, for the whole crate.
//! Using the `thiserror` crate, it provides one place to describe everything that can
//! abort a sweep, from bad configuration through unreadable input files to failures
//! inside the data retrieval call.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, raised while merging the sweep preset,
//!   an optional TOML file and the environment.
//! - **`Configuration`**: Semantic errors in otherwise well-formed configuration
//!   (e.g. a zero hour step). These are caught during validation.
//! - **`ChannelList`** / **`ReportFile`**: I/O failures on the two files the harness
//!   owns directly, tagged with the offending path.
//! - **`Cache`**, **`MissingData`**, **`ChannelNotFound`**, **`FrameFormat`**, **`Csv`**,
//!   **`Worker`**: Failures of the retrieval call.
//!
//! None of these are recovered locally. Every error ends the sweep, and any trial
//! lines already flushed to the report stay on disk.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ProfileError>;

/// Every way a profiling run can fail.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel list could not be opened or read.
    #[error("Failed to read channel list '{}': {source}", path.display())]
    ChannelList {
        /// Channel list path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The report file could not be opened or written.
    #[error("Failed to write report file '{}': {source}", path.display())]
    ReportFile {
        /// Report file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A frame cache file is malformed.
    #[error("Invalid cache '{}' line {line}: {message}", path.display())]
    Cache {
        /// Cache file path.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// No frame data covers part of the requested span.
    #[error("No frame data available for [{start}, {end})")]
    MissingData {
        /// Start of the uncovered interval.
        start: i64,
        /// End of the uncovered interval.
        end: i64,
    },

    /// A requested channel is not present in a frame file.
    #[error("Channel '{channel}' not found in '{}'", file.display())]
    ChannelNotFound {
        /// Requested channel name.
        channel: String,
        /// Frame file that lacks it.
        file: PathBuf,
    },

    /// A frame file has an unreadable layout or value.
    #[error("Malformed frame file '{}': {message}", file.display())]
    FrameFormat {
        /// Frame file path.
        file: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// CSV decoding error while reading a frame file.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A retrieval worker thread panicked.
    #[error("Retrieval worker failed: {0}")]
    Worker(String),
}

impl From<figment::Error> for ProfileError {
    fn from(value: figment::Error) -> Self {
        ProfileError::Config(Box::new(value))
    }
}
