//! Signal cache.
//!
//! The three cache "variants" are a **tagged union** over one capability
//! set rather than an inheritance
//! hierarchy: [`SignalCache`] is a plain `enum` whose variants each hold a
//! concrete implementor of [`SignalDataCache`], and its own trait impl just
//! forwards to whichever variant is active. Readers hold
//! a `SignalCache`, never a `Box<dyn SignalDataCache>`.
//!
//! The trait is `async_trait`.

pub mod local;
pub mod part;
pub mod shared;
pub mod shared_worker;

pub use local::LocalSignalCache;
pub use part::{combine_all_signal_parts, is_continuous_signal, SignalCachePart, SignalPart};
pub use shared::SharedMemorySignalCache;
pub use shared_worker::SharedWorkerSignalCache;

use crate::error::CacheError;
use crate::sample::SampleRate;
use async_trait::async_trait;

/// Capability set shared by every cache backing.
#[async_trait]
pub trait SignalDataCache: Send + Sync {
    /// `[input_range_start, input_range_end)`, awaited because a
    /// shared-memory-backed cache must take a read lock to answer.
    async fn input_range(&self) -> (f64, f64);

    /// Zero-copy (where possible) snapshot of the raw input signals
    /// currently available.
    async fn input_signals(&self) -> Vec<SignalPart>;

    /// `[output_range_start, output_range_end)`; synchronous, backed by
    /// local bookkeeping only.
    fn output_range(&self) -> (f64, f64);

    fn output_signal_sampling_rates(&self) -> Vec<SampleRate>;

    /// Per-channel `(updated_start, updated_end)` sample indices.
    fn output_signal_updated_ranges(&self) -> Vec<(i32, i32)>;

    /// Adopt `part` wholesale if the cache is empty, else attempt
    /// [`SignalCachePart::combine`]; on combine failure, log and leave
    /// state unchanged.
    fn insert_signals(&mut self, part: &SignalCachePart) -> Result<(), CacheError>;

    fn as_cache_part(&self) -> SignalCachePart;

    fn invalidate_output_signals(&mut self);

    /// Same as `invalidate_output_signals` plus dropping retained storage.
    fn release_buffers(&mut self);
}

/// Tagged union over the three cache backings.
pub enum SignalCache {
    Local(LocalSignalCache),
    SharedMemory(SharedMemorySignalCache),
    SharedWorker(SharedWorkerSignalCache),
}

#[async_trait]
impl SignalDataCache for SignalCache {
    async fn input_range(&self) -> (f64, f64) {
        match self {
            Self::Local(c) => c.input_range().await,
            Self::SharedMemory(c) => c.input_range().await,
            Self::SharedWorker(c) => c.input_range().await,
        }
    }

    async fn input_signals(&self) -> Vec<SignalPart> {
        match self {
            Self::Local(c) => c.input_signals().await,
            Self::SharedMemory(c) => c.input_signals().await,
            Self::SharedWorker(c) => c.input_signals().await,
        }
    }

    fn output_range(&self) -> (f64, f64) {
        match self {
            Self::Local(c) => c.output_range(),
            Self::SharedMemory(c) => c.output_range(),
            Self::SharedWorker(c) => c.output_range(),
        }
    }

    fn output_signal_sampling_rates(&self) -> Vec<SampleRate> {
        match self {
            Self::Local(c) => c.output_signal_sampling_rates(),
            Self::SharedMemory(c) => c.output_signal_sampling_rates(),
            Self::SharedWorker(c) => c.output_signal_sampling_rates(),
        }
    }

    fn output_signal_updated_ranges(&self) -> Vec<(i32, i32)> {
        match self {
            Self::Local(c) => c.output_signal_updated_ranges(),
            Self::SharedMemory(c) => c.output_signal_updated_ranges(),
            Self::SharedWorker(c) => c.output_signal_updated_ranges(),
        }
    }

    fn insert_signals(&mut self, part: &SignalCachePart) -> Result<(), CacheError> {
        match self {
            Self::Local(c) => c.insert_signals(part),
            Self::SharedMemory(c) => c.insert_signals(part),
            Self::SharedWorker(c) => c.insert_signals(part),
        }
    }

    fn as_cache_part(&self) -> SignalCachePart {
        match self {
            Self::Local(c) => c.as_cache_part(),
            Self::SharedMemory(c) => c.as_cache_part(),
            Self::SharedWorker(c) => c.as_cache_part(),
        }
    }

    fn invalidate_output_signals(&mut self) {
        match self {
            Self::Local(c) => c.invalidate_output_signals(),
            Self::SharedMemory(c) => c.invalidate_output_signals(),
            Self::SharedWorker(c) => c.invalidate_output_signals(),
        }
    }

    fn release_buffers(&mut self) {
        match self {
            Self::Local(c) => c.release_buffers(),
            Self::SharedMemory(c) => c.release_buffers(),
            Self::SharedWorker(c) => c.release_buffers(),
        }
    }
}
