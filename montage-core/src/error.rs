//! Error taxonomy. Each component gets its own
//! `thiserror`-derived enum; [`MontageError`] composes them at the
//! commission-response boundary, where the protocol always surfaces
//! `{success, error}` rather than letting an exception cross a context
//! boundary.

use thiserror::Error;

/// Failures of the shared-memory mutex.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MutexError {
    #[error("mutex has no backing buffer set")]
    NotInitialized,
    #[error("mutex (or its data arrays) has already been initialized")]
    AlreadyInitialized,
    #[error("lock acquisition timed out after {0:?}")]
    LockTimeout(std::time::Duration),
    #[error("range [{start}, {end}) is outside the mutex's allocated range")]
    OutOfBounds { start: f64, end: f64 },
    #[error("sampling rate mismatch on channel {channel}: expected {expected}, got {got}")]
    SamplingRateMismatch {
        channel: usize,
        expected: f32,
        got: f32,
    },
    #[error("mutex is a read-only coupled view")]
    ReadOnly,
}

/// Failures of the signal cache.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    #[error("parts are disjoint: [{a_start}, {a_end}) vs [{b_start}, {b_end})")]
    Disjoint {
        a_start: f64,
        a_end: f64,
        b_start: f64,
        b_end: f64,
    },
    #[error("parts have mismatched channel counts: {a} vs {b}")]
    ChannelCountMismatch { a: usize, b: usize },
    #[error("parts have mismatched sampling rate on channel {channel}: {a} vs {b}")]
    SamplingRateMismatch { channel: usize, a: f32, b: f32 },
    #[error(transparent)]
    Mutex(#[from] MutexError),
}

/// Failures reported by a [`crate::reader::SignalReaderBase`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReaderError {
    #[error("reader is in state {state:?}, which does not allow this operation")]
    InvalidState { state: &'static str },
    #[error("requested range is outside the cache's current coverage")]
    NotLoadedYet,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("format-specific read failed: {0}")]
    Format(String),
}

/// Failures of the montage processor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessorError {
    #[error("input cache does not yet cover the requested range")]
    NotLoadedYet,
    #[error("processor has no input cache configured")]
    NoInputCache,
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Failures of the worker commission protocol.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("commission props failed schema validation: {0}")]
    Validation(String),
    #[error("commission was superseded by a newer request")]
    Superseded,
    #[error("received a response with no matching pending commission (rn {0})")]
    OrphanedResponse(u64),
    #[error("named waiter list {0:?} was never resolved")]
    WaiterDropped(String),
    #[error("commission channel closed")]
    ChannelClosed,
}

/// Top-level error composed at the commission-response boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MontageError {
    #[error(transparent)]
    Mutex(#[from] MutexError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
