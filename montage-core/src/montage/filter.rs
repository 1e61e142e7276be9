//! Zero-phase filtering and the filter-padding calculator.
//!
//! The biquad math here is a house-built cascade rather than a pulled-in
//! DSP crate, since the frequency-domain behavior needed is only
//! contracted, not implemented against a fixed external dependency. The
//! cascade shape -- a chain of `(b0,b1,b2,a1,a2)` sections each carrying
//! its own state -- runs whole-buffer, offline, zero-phase
//! (forward-backward) filtering rather than a single-sample real-time
//! loop.

use std::f32::consts::PI;

/// One second-order IIR section in transposed direct form II, with its own
/// running state so a cascade can be replayed forward and backward
/// independently without cross-talk.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn new(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0,
            b1,
            b2,
            a1,
            a2,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

/// RBJ Audio EQ Cookbook lowpass section.
fn design_lowpass(freq_hz: f32, sr: f32, q: f32) -> Biquad {
    let w0 = 2.0 * PI * freq_hz / sr;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let b0 = (1.0 - cos_w0) / 2.0;
    let b1 = 1.0 - cos_w0;
    let b2 = (1.0 - cos_w0) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;

    Biquad::new(b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0)
}

fn design_highpass(freq_hz: f32, sr: f32, q: f32) -> Biquad {
    let w0 = 2.0 * PI * freq_hz / sr;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let b0 = (1.0 + cos_w0) / 2.0;
    let b1 = -(1.0 + cos_w0);
    let b2 = (1.0 + cos_w0) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;

    Biquad::new(b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0)
}

/// Narrow band-stop section; used for both `notch` (Q fixed high) and each
/// `bandreject` pair (Q derived from the requested bandwidth).
fn design_bandstop(center_hz: f32, sr: f32, q: f32) -> Biquad {
    let w0 = 2.0 * PI * center_hz / sr;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let b0 = 1.0;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;

    Biquad::new(b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0)
}

const DEFAULT_Q: f32 = std::f32::consts::SQRT_2 / 2.0;
const NOTCH_Q: f32 = 30.0;

/// A chain of biquad sections applied in series.
#[derive(Debug, Clone, Default)]
pub struct BiquadCascade {
    stages: Vec<Biquad>,
}

impl BiquadCascade {
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn reset(&mut self) {
        self.stages.iter_mut().for_each(Biquad::reset);
    }

    fn process_forward(&mut self, buf: &mut [f32]) {
        for sample in buf.iter_mut() {
            let mut v = *sample;
            for stage in self.stages.iter_mut() {
                v = stage.process_sample(v);
            }
            *sample = v;
        }
    }

    /// Zero-phase filtering: forward pass, reverse, forward pass again,
    /// reverse back. Resets internal state before each direction so the
    /// two passes don't share history.
    pub fn filtfilt(&mut self, buf: &mut [f32]) {
        self.reset();
        self.process_forward(buf);
        buf.reverse();
        self.reset();
        self.process_forward(buf);
        buf.reverse();
    }
}

/// Per-channel effective filter values, after resolving per-channel
/// overrides against the processor's global defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub highpass: Option<f64>,
    pub lowpass: Option<f64>,
    pub notch: Option<f64>,
    pub bandreject: Vec<(f64, f64)>,
}

impl FilterSet {
    pub fn is_active(&self) -> bool {
        self.highpass.is_some()
            || self.lowpass.is_some()
            || self.notch.is_some()
            || !self.bandreject.is_empty()
    }

    /// Build the cascade this filter set implies at sampling rate `sr`.
    pub fn build_cascade(&self, sr: f32) -> BiquadCascade {
        let mut stages = Vec::new();
        if let Some(hp) = self.highpass.filter(|v| *v > 0.0) {
            stages.push(design_highpass(hp as f32, sr, DEFAULT_Q));
        }
        if let Some(lp) = self.lowpass.filter(|v| *v > 0.0) {
            stages.push(design_lowpass(lp as f32, sr, DEFAULT_Q));
        }
        if let Some(notch) = self.notch.filter(|v| *v > 0.0) {
            stages.push(design_bandstop(notch as f32, sr, NOTCH_Q));
        }
        for &(low, high) in &self.bandreject {
            let center = ((low + high) / 2.0) as f32;
            let bandwidth = (high - low).max(1e-6) as f32;
            let q = center / bandwidth;
            stages.push(design_bandstop(center, sr, q));
        }
        BiquadCascade { stages }
    }
}

/// Output of the filter-padding calculator:
/// sample-index window, relative to the channel's full active signal, that
/// must be fetched/computed so that trimming the padding afterward leaves
/// exactly `[range_start, range_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingWindow {
    pub data_start: usize,
    pub data_end: usize,
    pub filter_len: usize,
}

/// `(filterLen, filterStart, filterEnd, rangeStart, rangeEnd)`. `interruptions` are gap sample-spans on the same
/// axis as `range_start`/`range_end`/`active_len`, already intersected
/// with `[0, active_len)`.
///
/// Padding is shortened on whichever side of the window an interruption
/// overlaps; padding is never crossed.
pub fn compute_padding(
    range_start: usize,
    range_end: usize,
    active_len: usize,
    padding_seconds: f64,
    sampling_rate: f32,
    interruptions: &[(usize, usize)],
) -> PaddingWindow {
    let filter_len = (padding_seconds * sampling_rate as f64).round().max(0.0) as usize;

    let mut data_start = range_start.saturating_sub(filter_len);
    let mut data_end = (range_end + filter_len).min(active_len);

    for &(gap_start, gap_end) in interruptions {
        // Left padding region is [data_start, range_start). Shorten it to
        // stop right after any gap that overlaps it.
        if gap_end <= range_start && gap_end > data_start {
            data_start = data_start.max(gap_end);
        }
        // Right padding region is [range_end, data_end). Shorten it to
        // stop right before any gap that overlaps it.
        if gap_start >= range_end && gap_start < data_end {
            data_end = data_end.min(gap_start);
        }
    }

    PaddingWindow {
        data_start: data_start.min(range_start),
        data_end: data_end.max(range_end).min(active_len.max(range_end)),
        filter_len,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn padding_never_crosses_a_gap() {
        // active signal [0, 1000), main range [400, 500), gap [350, 380)
        // on the left side only.
        let window = compute_padding(400, 500, 1000, 1.0, 100.0, &[(350, 380)]);
        assert!(window.data_start >= 380);
        assert_eq!(window.data_end, 600);
    }

    #[test]
    fn padding_without_gaps_is_symmetric() {
        let window = compute_padding(400, 500, 1000, 1.0, 100.0, &[]);
        assert_eq!(window.data_start, 300);
        assert_eq!(window.data_end, 600);
    }

    #[test]
    fn filtfilt_preserves_dc_level() {
        let mut filters = FilterSet::default();
        filters.lowpass = Some(10.0);
        let mut cascade = filters.build_cascade(100.0);
        let mut buf = vec![1.0f32; 200];
        cascade.filtfilt(&mut buf);
        // A lowpass shouldn't touch DC once transients settle.
        assert!((buf[150] - 1.0).abs() < 0.05);
    }
}
