//! Recording-time / cache-time coordinate newtypes and data-unit bookkeeping.
//! The actual recording<->cache conversion, which needs the
//! interruption map, lives in [`crate::reader::interruption`]; this module
//! only hosts the shared units and the data-unit <-> byte-offset helper that
//! every concrete reader reuses.

use crate::sample::{round_to_samples, FLOAT32_EPS};
use std::ops::{Add, Sub};

/// A point on the recording time axis (seconds), including interruptions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RecordingTime(pub f64);

/// A point on the cache time axis (seconds), gap-free/compacted.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CacheTime(pub f64);

macro_rules! impl_time_ops {
    ($ty:ident) => {
        impl $ty {
            pub const ZERO: $ty = $ty(0.0);

            pub fn seconds(self) -> f64 {
                self.0
            }
        }

        impl Add<f64> for $ty {
            type Output = $ty;
            fn add(self, rhs: f64) -> $ty {
                $ty(self.0 + rhs)
            }
        }

        impl Sub<f64> for $ty {
            type Output = $ty;
            fn sub(self, rhs: f64) -> $ty {
                $ty(self.0 - rhs)
            }
        }

        impl Sub<$ty> for $ty {
            type Output = f64;
            fn sub(self, rhs: $ty) -> f64 {
                self.0 - rhs.0
            }
        }
    };
}

impl_time_ops!(RecordingTime);
impl_time_ops!(CacheTime);

/// Index of a data unit within the recording.
pub type DataUnitIndex = u64;

/// Immutable-after-setup description of a recording's data-unit layout.
#[derive(Debug, Clone, Copy)]
pub struct DataUnitLayout {
    /// Duration of a single data unit, in seconds (`d_u`), typically 1.0.
    pub unit_duration: f64,
    /// Total number of data units in the recording (`N`).
    pub unit_count: u64,
    /// Bytes occupied by a single data unit (`D`).
    pub unit_bytes: u64,
    /// Fixed header offset preceding the first data unit.
    pub header_offset: u64,
}

impl DataUnitLayout {
    /// `floor((t + eps - prior_gaps) / d_u)`. Callers
    /// pass `t` already expressed in cache time with `prior_gaps` folded in
    /// by the interruption-aware conversion, or `0.0` for cache-time input.
    pub fn unit_index(&self, cache_time: CacheTime) -> DataUnitIndex {
        let idx = ((cache_time.0 + FLOAT32_EPS) / self.unit_duration).floor();
        idx.max(0.0) as DataUnitIndex
    }

    /// Byte offset of the given data unit: `(unit_index * D) + header_offset`.
    pub fn byte_offset(&self, unit_index: DataUnitIndex) -> u64 {
        unit_index * self.unit_bytes + self.header_offset
    }

    /// Total recording duration spanned by `unit_count` units.
    pub fn total_cache_duration(&self) -> f64 {
        self.unit_duration * self.unit_count as f64
    }
}

/// Round `seconds * sampling_rate` to the nearest sample index, the single
/// helper used everywhere to avoid ad-hoc inline math bugs.
#[inline]
pub fn seconds_to_sample_index(seconds: f64, sampling_rate: f32) -> i64 {
    round_to_samples(seconds * sampling_rate as f64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_unit_index_floors() {
        let layout = DataUnitLayout {
            unit_duration: 1.0,
            unit_count: 100,
            unit_bytes: 256,
            header_offset: 8,
        };
        assert_eq!(layout.unit_index(CacheTime(4.999999)), 4);
        assert_eq!(layout.unit_index(CacheTime(5.0)), 5);
        assert_eq!(layout.byte_offset(5), 5 * 256 + 8);
    }
}
