//! Frame data retrieval.
//!
//! The harness only ever talks to a [`DataSource`]: hand it a channel subset, a GPS
//! span and a process-count hint, get back one [`ChannelBuffer`] per channel. How the
//! source uses the process count is its own business.
//!
//! # Implementations
//!
//! - [`FrameCacheSource`] - reads frame files listed in a frame cache
//! - [`MockSource`] - generates synthetic samples, for dry runs and tests

pub mod cache;
pub mod frames;
pub mod mock;

pub use cache::{CacheEntry, FrameCache};
pub use frames::FrameCacheSource;
pub use mock::MockSource;

use crate::config::{Backend, MockConfig};
use crate::error::AppResult;
use std::collections::HashMap;
use std::path::Path;

/// Retrieved samples keyed by channel name.
pub type DataMap = HashMap<String, ChannelBuffer>;

/// One retrieval call.
#[derive(Debug, Clone, Copy)]
pub struct DataRequest<'a> {
    /// Channels to read
    pub channels: &'a [String],
    /// Inclusive start GPS time
    pub start: i64,
    /// Exclusive end GPS time
    pub end: i64,
    /// Parallelism hint for the source
    pub nproc: usize,
    /// Ask the source to report progress
    pub verbose: bool,
}

/// Samples for one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelBuffer {
    /// 16-bit integer samples
    I16(Vec<i16>),
    /// 32-bit integer samples
    I32(Vec<i32>),
    /// Single precision samples
    F32(Vec<f32>),
    /// Double precision samples
    F64(Vec<f64>),
}

impl ChannelBuffer {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            ChannelBuffer::I16(v) => v.len(),
            ChannelBuffer::I32(v) => v.len(),
            ChannelBuffer::F32(v) => v.len(),
            ChannelBuffer::F64(v) => v.len(),
        }
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per sample.
    pub fn item_size(&self) -> usize {
        match self {
            ChannelBuffer::I16(_) => std::mem::size_of::<i16>(),
            ChannelBuffer::I32(_) => std::mem::size_of::<i32>(),
            ChannelBuffer::F32(_) => std::mem::size_of::<f32>(),
            ChannelBuffer::F64(_) => std::mem::size_of::<f64>(),
        }
    }

    /// `len() * item_size()`.
    pub fn nbytes(&self) -> usize {
        self.len() * self.item_size()
    }
}

/// Total payload size of a retrieval result.
pub fn total_bytes(data: &DataMap) -> u64 {
    data.values().map(|buf| buf.nbytes() as u64).sum()
}

/// Anything that can serve frame data to a trial.
///
/// The source reference (cache file, server, ...) is fixed when the source is built.
pub trait DataSource {
    /// Fetch every requested channel over `[request.start, request.end)`.
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap>;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap> {
        (**self).get_data(request)
    }
}

/// Build the source selected by `backend`, reading from `cache` when it needs one.
pub fn open_source(
    backend: Backend,
    cache: &Path,
    mock: &MockConfig,
) -> AppResult<Box<dyn DataSource>> {
    let source: Box<dyn DataSource> = match backend {
        Backend::Cache => Box::new(FrameCacheSource::open(cache)?),
        Backend::Mock => Box::new(MockSource::new(mock.sample_rate_hz)),
    };
    Ok(source)
}

/// Split `items` into at most `parts` contiguous chunks of near-equal size.
pub(crate) fn partition<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }
    let parts = parts.clamp(1, items.len());
    let chunk = items.len().div_ceil(parts);
    items.chunks(chunk).collect()
}
