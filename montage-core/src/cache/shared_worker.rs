//! Shared-worker cache proxy.
//!
//! Used when a raw-signal reader runs in its own execution context and
//! services multiple montage workers: this wraps a [`CommissionClient`]
//! and exposes [`SignalDataCache`] by commissioning the remote worker for
//! every read. Each commission carries `consumer_id` so one transport can
//! multiplex several consumers; this variant never
//! writes -- the remote reader worker owns all mutation.

use super::part::{SignalCachePart, SignalPart};
use super::SignalDataCache;
use crate::error::{CacheError, MutexError};
use crate::protocol::{Action, CommissionClient};
use crate::sample::SampleRate;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;

/// Read-only proxy onto a remote reader worker's cache.
pub struct SharedWorkerSignalCache {
    client: CommissionClient,
    consumer_id: u64,
    /// Mirrors the last `get-signals` response so the synchronous getters
    /// (`output_range`, etc.) have something to report between fetches.
    last: RwLock<SignalCachePart>,
}

impl SharedWorkerSignalCache {
    pub fn new(client: CommissionClient, consumer_id: u64) -> Self {
        Self {
            client,
            consumer_id,
            last: RwLock::new(SignalCachePart::empty()),
        }
    }

    /// Commission `get-signals` for `[start, end)` and cache the result as
    /// this proxy's current view.
    pub async fn fetch(&self, start: f64, end: f64) -> Result<(), CacheError> {
        let response = self
            .client
            .commission(
                Action::GetSignals,
                json!({ "consumer_id": self.consumer_id, "range": [start, end] }),
                false,
            )
            .await
            .map_err(|_| CacheError::Mutex(MutexError::LockTimeout(std::time::Duration::from_secs(5))))?;

        if !response.success {
            return Err(CacheError::Mutex(MutexError::NotInitialized));
        }

        if let Ok(part) = serde_json::from_value::<SignalCachePart>(response.payload) {
            *self.last.write() = part;
        }
        Ok(())
    }
}

#[async_trait]
impl SignalDataCache for SharedWorkerSignalCache {
    async fn input_range(&self) -> (f64, f64) {
        let part = self.last.read();
        (part.start, part.end)
    }

    async fn input_signals(&self) -> Vec<SignalPart> {
        self.last.read().signals.clone()
    }

    fn output_range(&self) -> (f64, f64) {
        let part = self.last.read();
        (part.start, part.end)
    }

    fn output_signal_sampling_rates(&self) -> Vec<SampleRate> {
        self.last.read().signals.iter().map(|s| s.sampling_rate).collect()
    }

    fn output_signal_updated_ranges(&self) -> Vec<(i32, i32)> {
        self.last
            .read()
            .signals
            .iter()
            .map(|s| (s.updated_start as i32, s.updated_end as i32))
            .collect()
    }

    fn insert_signals(&mut self, _part: &SignalCachePart) -> Result<(), CacheError> {
        Err(CacheError::Mutex(MutexError::ReadOnly))
    }

    fn as_cache_part(&self) -> SignalCachePart {
        self.last.read().clone()
    }

    fn invalidate_output_signals(&mut self) {
        *self.last.write() = SignalCachePart::empty();
    }

    fn release_buffers(&mut self) {
        *self.last.write() = SignalCachePart::empty();
    }
}
