//! Synthetic frame source.
//!
//! Produces Gaussian-ish `f32` noise for every requested channel without touching
//! disk. Channels are split across `nproc` scoped threads so the process-count axis
//! of a sweep still has something to scale.

use super::{partition, ChannelBuffer, DataMap, DataRequest, DataSource};
use crate::error::{AppResult, ProfileError};
use rand::Rng;
use tracing::{debug, info};

/// Generates synthetic samples at a fixed rate.
#[derive(Debug, Clone)]
pub struct MockSource {
    sample_rate_hz: f64,
}

impl MockSource {
    /// Create a source producing `sample_rate_hz` samples per channel per second.
    pub fn new(sample_rate_hz: f64) -> Self {
        Self { sample_rate_hz }
    }

    /// Samples produced per channel for a `[start, end)` span.
    pub fn samples_for(&self, start: i64, end: i64) -> usize {
        let seconds = end.saturating_sub(start).max(0) as f64;
        (seconds * self.sample_rate_hz).round() as usize
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new(16.0)
    }
}

impl DataSource for MockSource {
    fn get_data(&self, request: &DataRequest<'_>) -> AppResult<DataMap> {
        let n = self.samples_for(request.start, request.end);
        let groups = partition(request.channels, request.nproc);
        if request.verbose {
            info!(channels = request.channels.len(), samples = n, "Generating mock data");
        } else {
            debug!(channels = request.channels.len(), samples = n, "Generating mock data");
        }

        let parts: Vec<AppResult<Vec<(String, ChannelBuffer)>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| scope.spawn(move || generate(group, n)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().map_err(|_| {
                        ProfileError::Worker("mock generator thread panicked".into())
                    })
                })
                .collect()
        });

        let mut data = DataMap::with_capacity(request.channels.len());
        for part in parts {
            data.extend(part?);
        }
        Ok(data)
    }
}

fn generate(channels: &[String], n: usize) -> Vec<(String, ChannelBuffer)> {
    let mut rng = rand::thread_rng();
    channels
        .iter()
        .map(|channel| {
            // sum of three uniforms, roughly normal
            let samples = (0..n)
                .map(|_| rng.gen::<f32>() + rng.gen::<f32>() + rng.gen::<f32>() - 1.5)
                .collect();
            (channel.clone(), ChannelBuffer::F32(samples))
        })
        .collect()
}
