//! Signal reader base.
//!
//! Format-specific readers (EDF and friends) are external to this crate
//!; they only need to implement [`FileFormatReader`].
//! Everything else -- coordinate conversion, the block table, the
//! interruption map, cache ownership, the state machine -- lives here and
//! is reused verbatim.

pub mod block;
pub mod interruption;

pub use block::{DataBlock, DataBlockTable};
pub use interruption::{Interruption, InterruptionMap};

use crate::cache::{SignalCache, SignalDataCache};
use crate::error::ReaderError;
use crate::highlight::HighlightContext;
use crate::mutex::SharedMutex;
use crate::protocol::CommissionClient;
use crate::time::{CacheTime, DataUnitLayout, RecordingTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `readPartFromFile(offset, length)`: the only
/// format-specific hook the core requires.
pub trait FileFormatReader: Send + Sync {
    fn read_part_from_file(&self, byte_start: u64, byte_len: u64) -> Result<Vec<u8>, ReaderError>;
}

/// `Uninitialized -> CacheOnly -> MutexReady -> Releasing -> Uninitialized`
///. Signal retrieval is legal only in `CacheOnly` or
/// `MutexReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Uninitialized,
    CacheOnly,
    MutexReady,
    Releasing,
}

impl ReaderState {
    fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::CacheOnly => "CacheOnly",
            Self::MutexReady => "MutexReady",
            Self::Releasing => "Releasing",
        }
    }
}

/// Format-independent per-recording bookkeeping.
pub struct SignalReaderBase {
    state: ReaderState,
    format: Arc<dyn FileFormatReader>,
    interruptions: InterruptionMap,
    blocks: DataBlockTable,
    layout: DataUnitLayout,
    highlights: HighlightContext,
    cache: Option<SignalCache>,
    recording_length: f64,
    /// Cooperative cancellation for a background cache-fill loop: `release_cache` sets this to `false`; the loop
    /// checks it between block reads.
    continue_flag: Arc<AtomicBool>,
}

impl SignalReaderBase {
    pub fn new(format: Arc<dyn FileFormatReader>, layout: DataUnitLayout, recording_length: f64) -> Self {
        Self {
            state: ReaderState::Uninitialized,
            format,
            interruptions: InterruptionMap::new(),
            blocks: DataBlockTable::new(),
            layout,
            highlights: HighlightContext::new(),
            cache: None,
            recording_length,
            continue_flag: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    fn require_state(&self, allowed: &[ReaderState]) -> Result<(), ReaderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ReaderError::InvalidState {
                state: self.state.name(),
            })
        }
    }

    /// `setup_cache_with_input`: attach a local in-memory cache.
    pub fn setup_cache_with_input(&mut self) -> Result<(), ReaderError> {
        self.require_state(&[ReaderState::Uninitialized])?;
        self.cache = Some(SignalCache::Local(crate::cache::LocalSignalCache::new()));
        self.state = ReaderState::CacheOnly;
        Ok(())
    }

    /// `setup_mutex_with_input`: couple to a shared-memory mutex.
    pub fn setup_mutex_with_input(&mut self, mutex: Arc<SharedMutex>) -> Result<(), ReaderError> {
        self.require_state(&[ReaderState::Uninitialized])?;
        self.cache = Some(SignalCache::SharedMemory(
            crate::cache::SharedMemorySignalCache::new(mutex),
        ));
        self.state = ReaderState::MutexReady;
        Ok(())
    }

    /// `setup_shared_worker_with_input`: proxy reads through a remote
    /// shared worker.
    pub fn setup_shared_worker_with_input(
        &mut self,
        client: CommissionClient,
        consumer_id: u64,
    ) -> Result<(), ReaderError> {
        self.require_state(&[ReaderState::Uninitialized])?;
        self.cache = Some(SignalCache::SharedWorker(
            crate::cache::SharedWorkerSignalCache::new(client, consumer_id),
        ));
        self.state = ReaderState::MutexReady;
        Ok(())
    }

    /// Begin releasing the cache: flips cancellation for any in-flight
    /// background fill, drops cache storage, and returns to
    /// `Uninitialized`.
    pub fn release_cache(&mut self) -> Result<(), ReaderError> {
        self.require_state(&[ReaderState::CacheOnly, ReaderState::MutexReady])?;
        self.state = ReaderState::Releasing;
        self.continue_flag.store(false, Ordering::SeqCst);
        if let Some(cache) = self.cache.as_mut() {
            cache.release_buffers();
        }
        self.cache = None;
        self.state = ReaderState::Uninitialized;
        self.continue_flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn continue_flag(&self) -> Arc<AtomicBool> {
        self.continue_flag.clone()
    }

    pub fn cache(&self) -> Result<&SignalCache, ReaderError> {
        self.require_state(&[ReaderState::CacheOnly, ReaderState::MutexReady])?;
        self.cache.as_ref().ok_or(ReaderError::NotLoadedYet)
    }

    pub fn cache_mut(&mut self) -> Result<&mut SignalCache, ReaderError> {
        self.require_state(&[ReaderState::CacheOnly, ReaderState::MutexReady])?;
        self.cache.as_mut().ok_or(ReaderError::NotLoadedYet)
    }

    pub fn interruptions(&self) -> &InterruptionMap {
        &self.interruptions
    }

    /// Record a newly discovered interruption; observers are notified
    /// through the worker commission protocol's `set-interruptions` flow,
    /// not here.
    pub fn set_interruption(&mut self, start: f64, duration: f64) {
        self.interruptions.set(start, duration);
    }

    pub fn blocks(&self) -> &DataBlockTable {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut DataBlockTable {
        &mut self.blocks
    }

    pub fn layout(&self) -> DataUnitLayout {
        self.layout
    }

    pub fn recording_length(&self) -> f64 {
        self.recording_length
    }

    pub fn highlights(&self) -> &HighlightContext {
        &self.highlights
    }

    pub fn highlights_mut(&mut self) -> &mut HighlightContext {
        &mut self.highlights
    }

    pub fn recording_to_cache(&self, rt: RecordingTime) -> CacheTime {
        self.interruptions.recording_to_cache(rt)
    }

    pub fn cache_to_recording(&self, ct: CacheTime) -> RecordingTime {
        self.interruptions.cache_to_recording(ct)
    }

    /// `getDataGaps(range, useCacheTime)`.
    pub fn data_gaps(&self, start: f64, end: f64, use_cache_time: bool) -> Vec<Interruption> {
        self.interruptions.data_gaps(start, end, use_cache_time)
    }

    /// Raw bytes for `[byte_start, byte_start+byte_len)`; delegates to the
    /// format-specific implementation.
    pub fn read_part_from_file(&self, byte_start: u64, byte_len: u64) -> Result<Vec<u8>, ReaderError> {
        self.format.read_part_from_file(byte_start, byte_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct NullFormat;
    impl FileFormatReader for NullFormat {
        fn read_part_from_file(&self, _start: u64, len: u64) -> Result<Vec<u8>, ReaderError> {
            Ok(vec![0u8; len as usize])
        }
    }

    fn layout() -> DataUnitLayout {
        DataUnitLayout {
            unit_duration: 1.0,
            unit_count: 100,
            unit_bytes: 256,
            header_offset: 0,
        }
    }

    #[test]
    fn state_machine_rejects_signal_ops_while_uninitialized() {
        let reader = SignalReaderBase::new(Arc::new(NullFormat), layout(), 100.0);
        assert!(matches!(reader.cache(), Err(ReaderError::InvalidState { .. })));
    }

    #[test]
    fn setup_then_release_returns_to_uninitialized() {
        let mut reader = SignalReaderBase::new(Arc::new(NullFormat), layout(), 100.0);
        reader.setup_cache_with_input().unwrap();
        assert_eq!(reader.state(), ReaderState::CacheOnly);
        reader.release_cache().unwrap();
        assert_eq!(reader.state(), ReaderState::Uninitialized);
    }

    #[test]
    fn double_setup_is_rejected() {
        let mut reader = SignalReaderBase::new(Arc::new(NullFormat), layout(), 100.0);
        reader.setup_cache_with_input().unwrap();
        assert!(matches!(
            reader.setup_cache_with_input(),
            Err(ReaderError::InvalidState { .. })
        ));
    }
}
