//! Montage computation and signal caching core.
//!
//! Five components, each its own module:
//!
//! - [`mutex`] -- C1, the shared-memory mutex.
//! - [`cache`] -- C2, the tagged-union signal cache.
//! - [`reader`] -- C3, the format-independent reader base.
//! - [`montage`] -- C4, the montage model and processor.
//! - [`protocol`] -- C5, the worker commission protocol.
//!
//! [`sample`], [`time`], [`error`], [`settings`], [`highlight`] and [`sync`]
//! carry the cross-cutting types all five lean on.

pub mod cache;
pub mod error;
pub mod highlight;
pub mod montage;
pub mod mutex;
pub mod protocol;
pub mod reader;
pub mod sample;
pub mod settings;
pub mod sync;
pub mod time;

pub use cache::{SignalCache, SignalCachePart, SignalDataCache, SignalPart};
pub use error::{CacheError, MontageError, MutexError, ProcessorError, ProtocolError, ReaderError};
pub use highlight::{Highlight, HighlightContext};
pub use montage::{ChannelSource, FilterSet, GetSignalsConfig, Montage, MontageChannel, MontageProcessor};
pub use mutex::{ChannelArrayConfig, LockMode, SharedMutex};
pub use protocol::{Action, CommissionClient, CommissionRequest, CommissionResponse};
pub use reader::{DataBlock, DataBlockTable, FileFormatReader, Interruption, InterruptionMap, ReaderState, SignalReaderBase};
pub use settings::{ChannelDisplayPolicy, MontageSettings, WorkerContext};
pub use sync::BiChannel;
pub use time::{CacheTime, DataUnitLayout, RecordingTime};
