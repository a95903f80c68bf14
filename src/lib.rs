//! # Frame Read Profiler
//!
//! Library behind the `profile-get-data` binary. It measures how long frame data
//! retrieval takes as the number of channels, the number of reader processes and
//! the span of data grow, appending one line per measurement to a report file.
//!
//! ## Crate Structure
//!
//! - **`channels`**: Loads the newline-delimited channel list.
//! - **`config`**: `HarnessConfig` for one run and the `SweepConfig` value object that
//!   describes a grid, loaded from presets, TOML and the environment with `figment`.
//! - **`error`**: The `ProfileError` enum used across the crate.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`report`**: The append-only report file and its line format.
//! - **`source`**: The `DataSource` trait plus the frame cache and mock implementations.
//! - **`sweep`**: The sweep state machine (warm-up, then the grid).
//! - **`trace`**: Background collector that keeps an HTML progress page up to date.
//! - **`trial`**: Times a single retrieval call.

pub mod channels;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod source;
pub mod sweep;
pub mod trace;
pub mod trial;
