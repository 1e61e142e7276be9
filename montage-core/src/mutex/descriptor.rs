//! Coupling descriptor.
//!
//! A serializable descriptor passed across a worker boundary so a second
//! context can attach a read-only view onto the same shared region. Here
//! "coupling" happens inside one process, so the descriptor carries the
//! actual `Arc` handle rather than a re-openable shared-memory name; the
//! `channels` schema is kept alongside it, serde-serializable, so a remote
//! commission payload could still be built from it without inventing a
//! second shape.

use super::MutexBuffer;
use crate::error::MutexError;
use crate::sample::SampleRate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One channel array's shape, as it would be encoded in a coupling message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelArraySchema {
    pub sampling_rate: SampleRate,
    pub length_samples: usize,
    /// Name of the backing array's element type, e.g. `"Float32Array"`
    ///. Kept even though this process has no use for
    /// dynamic dispatch on it, since it's part of the wire contract a
    /// coupling descriptor is expected to carry.
    pub type_name: String,
}

/// Handle produced by [`super::SharedMutex::properties_for_coupling`] and
/// consumed by [`super::SharedMutex::from_descriptor`].
pub struct MutexDescriptor {
    pub(super) buffer: Arc<MutexBuffer>,
    pub allocated_range: f64,
    pub channels: Vec<ChannelArraySchema>,
}

impl MutexDescriptor {
    /// Reject a descriptor whose declared channel schema doesn't match what
    /// the backing buffer actually holds.
    pub(super) fn verify_schema(&self) -> Result<(), MutexError> {
        let data = self.buffer.data.read();
        if data.channels.len() != self.channels.len() {
            return Err(MutexError::OutOfBounds {
                start: data.channels.len() as f64,
                end: self.channels.len() as f64,
            });
        }
        for (actual, declared) in data.channels.iter().zip(self.channels.iter()) {
            if !crate::sample::sampling_rate_eq(actual.sampling_rate, declared.sampling_rate) {
                return Err(MutexError::SamplingRateMismatch {
                    channel: 0,
                    expected: actual.sampling_rate,
                    got: declared.sampling_rate,
                });
            }
        }
        Ok(())
    }
}
