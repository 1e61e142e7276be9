//! Shared-memory-mutex-backed cache.

use super::part::{SignalCachePart, SignalPart};
use super::SignalDataCache;
use crate::error::CacheError;
use crate::mutex::{LockMode, SharedMutex};
use crate::sample::SampleRate;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a [`SharedMutex`] (write-capable or a read-only coupled view) as a
/// [`SignalDataCache`]. Both the input and output getters read/write
/// through the same buffer: whichever side is write-capable is the one
/// that actually calls `insert_signals`.
pub struct SharedMemorySignalCache {
    mutex: Arc<SharedMutex>,
}

impl SharedMemorySignalCache {
    pub fn new(mutex: Arc<SharedMutex>) -> Self {
        Self { mutex }
    }

    pub fn mutex(&self) -> &Arc<SharedMutex> {
        &self.mutex
    }
}

#[async_trait]
impl SignalDataCache for SharedMemorySignalCache {
    async fn input_range(&self) -> (f64, f64) {
        self.mutex
            .execute_with_lock(LockMode::Read, |d| d.range())
            .unwrap_or((0.0, 0.0))
    }

    async fn input_signals(&self) -> Vec<SignalPart> {
        self.mutex
            .execute_with_lock(LockMode::Read, |d| {
                (0..d.channel_count())
                    .map(|i| {
                        let sr = d.channel_sampling_rate(i).unwrap_or(0.0);
                        let samples = d.channel_samples(i).map(|s| s.to_vec()).unwrap_or_default();
                        let (start, end) = d.channel_updated_range(i).unwrap_or((-1, -1));
                        SignalPart {
                            sampling_rate: sr,
                            data: samples,
                            updated_start: start.max(0) as usize,
                            updated_end: end.max(0) as usize,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn output_range(&self) -> (f64, f64) {
        self.mutex.try_peek_range().unwrap_or((0.0, 0.0))
    }

    fn output_signal_sampling_rates(&self) -> Vec<SampleRate> {
        self.mutex
            .execute_with_lock(LockMode::Read, |d| {
                (0..d.channel_count())
                    .map(|i| d.channel_sampling_rate(i).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn output_signal_updated_ranges(&self) -> Vec<(i32, i32)> {
        self.mutex
            .execute_with_lock(LockMode::Read, |d| {
                (0..d.channel_count())
                    .map(|i| d.channel_updated_range(i).unwrap_or((-1, -1)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert_signals(&mut self, part: &SignalCachePart) -> Result<(), CacheError> {
        self.mutex.insert_signals(part).map_err(CacheError::from)
    }

    fn as_cache_part(&self) -> SignalCachePart {
        let (start, end) = self.output_range();
        let signals = self
            .mutex
            .execute_with_lock(LockMode::Read, |d| {
                (0..d.channel_count())
                    .map(|i| SignalPart {
                        sampling_rate: d.channel_sampling_rate(i).unwrap_or(0.0),
                        data: d.channel_samples(i).map(|s| s.to_vec()).unwrap_or_default(),
                        updated_start: 0,
                        updated_end: 0,
                    })
                    .collect()
            })
            .unwrap_or_default();
        SignalCachePart { start, end, signals }
    }

    fn invalidate_output_signals(&mut self) {
        let _ = self.mutex.invalidate(None);
    }

    fn release_buffers(&mut self) {
        let _ = self.mutex.invalidate(None);
    }
}
