//! Basic numeric aliases shared across the crate.
//!
//! Everything crossing a commission boundary (see [`crate::protocol`]) is a
//! 32-bit float array; `f32` is used throughout rather than `f64` to keep
//! in-memory layout compatible with the shared-memory mutex.

/// Sampling rate, in Hz.
pub type SampleRate = f32;

/// Sample index within a buffer.
pub type NSamples = usize;

/// Channel index within a montage or raw-signal array.
pub type NChannels = usize;

/// Single signal sample.
pub type Sample = f32;

/// Epsilon used to counter 32->64 bit rounding when converting between
/// seconds and sample indices.
pub const FLOAT32_EPS: f64 = f32::EPSILON as f64;

/// Sentinel returned by coordinate conversions that would otherwise need to
/// signal failure without an `Err`. Interpretation is
/// positional, matching the wire-level `NUMERIC_ERROR_VALUE`.
pub const NUMERIC_ERROR: f64 = -1.0;

/// Sentinel for "no value set" slots inside the shared-memory mutex layout
/// (`updated_start`/`updated_end`).
pub const EMPTY_FIELD: i32 = -1;

/// Round to the nearest sample index for `startPos`/`endPos`/`filterLen`
/// style coordinates: `round(value)`, never truncate.
#[inline]
pub fn round_to_samples(value: f64) -> i64 {
    value.round() as i64
}

/// Compare two sampling rates for equality within float32 precision, as used
/// by `insert_signals`'s sampling-rate check.
#[inline]
pub fn sampling_rate_eq(a: SampleRate, b: SampleRate) -> bool {
    (a - b).abs() <= f32::EPSILON * a.abs().max(b.abs()).max(1.0)
}
