//! `SignalPart` / `SignalCachePart` and the combine/continuity rules over
//! them.

use crate::error::CacheError;
use crate::sample::{sampling_rate_eq, NSamples, Sample, SampleRate};
use serde::{Deserialize, Serialize};

/// One channel's worth of cached samples over some `[start, end)` window.
///
/// `updated_start`/`updated_end` mark the sub-range within `data` that holds
/// valid samples; outside that range values are defined but not meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPart {
    pub sampling_rate: SampleRate,
    pub data: Vec<Sample>,
    pub updated_start: NSamples,
    pub updated_end: NSamples,
}

impl SignalPart {
    pub fn empty(sampling_rate: SampleRate, n_samples: NSamples) -> Self {
        Self {
            sampling_rate,
            data: vec![0.0; n_samples],
            updated_start: 0,
            updated_end: 0,
        }
    }

    pub fn full(sampling_rate: SampleRate, data: Vec<Sample>) -> Self {
        let len = data.len();
        Self {
            sampling_rate,
            data,
            updated_start: 0,
            updated_end: len,
        }
    }
}

/// A cached window `[start, end)` over an ordered sequence of channels,
/// indexed by channel id. Invariant: for a fully populated
/// part, `signals[c].data.len() == round(signals[c].sampling_rate * (end -
/// start))`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCachePart {
    pub start: f64,
    pub end: f64,
    pub signals: Vec<SignalPart>,
}

impl SignalCachePart {
    pub fn empty() -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            signals: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() || self.end <= self.start
    }

    fn check_compatible(a: &SignalCachePart, b: &SignalCachePart) -> Result<(), CacheError> {
        if a.signals.len() != b.signals.len() {
            return Err(CacheError::ChannelCountMismatch {
                a: a.signals.len(),
                b: b.signals.len(),
            });
        }
        for (i, (sa, sb)) in a.signals.iter().zip(b.signals.iter()).enumerate() {
            if !sampling_rate_eq(sa.sampling_rate, sb.sampling_rate) {
                return Err(CacheError::SamplingRateMismatch {
                    channel: i,
                    a: sa.sampling_rate,
                    b: sb.sampling_rate,
                });
            }
        }
        Ok(())
    }

    /// Combine two parts. `self` and
    /// `other` may be provided in either start order; the earlier-starting
    /// one is used as the base. Fails (without mutating either input) if the
    /// parts are disjoint or incompatible.
    pub fn combine(&self, other: &SignalCachePart) -> Result<SignalCachePart, CacheError> {
        Self::check_compatible(self, other)?;

        let (a, b) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };

        if b.start > a.end {
            return Err(CacheError::Disjoint {
                a_start: a.start,
                a_end: a.end,
                b_start: b.start,
                b_end: b.end,
            });
        }

        if b.end <= a.end {
            // B contained in A: no-op, A already covers the requested range.
            return Ok(a.clone());
        }

        let mut signals = Vec::with_capacity(a.signals.len());
        for (sa, sb) in a.signals.iter().zip(b.signals.iter()) {
            let sr = sa.sampling_rate as f64;
            let total_len = crate::sample::round_to_samples(sr * (b.end - a.start)).max(0) as usize;
            let mut data = vec![0.0f32; total_len];

            let a_len = crate::sample::round_to_samples(sr * (a.end - a.start)).max(0) as usize;
            let a_len = a_len.min(sa.data.len()).min(total_len);
            data[..a_len].copy_from_slice(&sa.data[..a_len]);

            // Tail of B not already covered by A.
            let b_tail_start_in_ab =
                crate::sample::round_to_samples(sr * (a.end - a.start)).max(0) as usize;
            let b_tail_start_in_b =
                crate::sample::round_to_samples(sr * (a.end - b.start)).max(0) as usize;
            if b_tail_start_in_b < sb.data.len() && b_tail_start_in_ab < total_len {
                let tail = &sb.data[b_tail_start_in_b..];
                let copy_len = tail.len().min(total_len - b_tail_start_in_ab);
                data[b_tail_start_in_ab..b_tail_start_in_ab + copy_len]
                    .copy_from_slice(&tail[..copy_len]);
            }

            signals.push(SignalPart::full(sa.sampling_rate, data));
        }

        Ok(SignalCachePart {
            start: a.start,
            end: b.end,
            signals,
        })
    }
}

/// Greedily merge any pair of parts whose combine succeeds until no further
/// merges apply; returns the resulting disjoint set sorted by `start`.
pub fn combine_all_signal_parts(parts: &[SignalCachePart]) -> Vec<SignalCachePart> {
    let mut pending: Vec<SignalCachePart> = parts.to_vec();
    pending.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());

    let mut merged_any = true;
    while merged_any {
        merged_any = false;
        let mut next: Vec<SignalCachePart> = Vec::with_capacity(pending.len());

        for part in pending.into_iter() {
            if let Some(last) = next.last_mut() {
                if let Ok(combined) = last.combine(&part) {
                    *last = combined;
                    merged_any = true;
                    continue;
                }
            }
            next.push(part);
        }
        pending = next;
    }

    pending
}

/// `true` iff `combine_all_signal_parts` collapses the input to a single
/// part.
pub fn is_continuous_signal(parts: &[SignalCachePart]) -> bool {
    !parts.is_empty() && combine_all_signal_parts(parts).len() == 1
}

/// Wire shape for a [`SignalCachePart`]. [`SignalCachePart`]/[`SignalPart`] don't derive
/// `Serialize`/`Deserialize` directly since their field names should stay
/// free to diverge from the wire contract; these mirrors pin the contract
/// down instead.
#[derive(Serialize, Deserialize)]
struct WireSignalCachePart {
    start: f64,
    end: f64,
    signals: Vec<WireSignalPart>,
}

#[derive(Serialize, Deserialize)]
struct WireSignalPart {
    sampling_rate: f32,
    data: Vec<Sample>,
    updated_start: usize,
    updated_end: usize,
}

impl From<SignalCachePart> for WireSignalCachePart {
    fn from(p: SignalCachePart) -> Self {
        Self {
            start: p.start,
            end: p.end,
            signals: p
                .signals
                .into_iter()
                .map(|s| WireSignalPart {
                    sampling_rate: s.sampling_rate,
                    data: s.data,
                    updated_start: s.updated_start,
                    updated_end: s.updated_end,
                })
                .collect(),
        }
    }
}

impl Serialize for SignalCachePart {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireSignalCachePart::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignalCachePart {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireSignalCachePart::deserialize(deserializer)?;
        Ok(SignalCachePart {
            start: wire.start,
            end: wire.end,
            signals: wire
                .signals
                .into_iter()
                .map(|s| SignalPart {
                    sampling_rate: s.sampling_rate,
                    data: s.data,
                    updated_start: s.updated_start,
                    updated_end: s.updated_end,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn part(start: f64, end: f64, sr: f32, value: f32) -> SignalCachePart {
        let n = ((end - start) * sr as f64).round() as usize;
        SignalCachePart {
            start,
            end,
            signals: vec![SignalPart::full(sr, vec![value; n])],
        }
    }

    #[test]
    fn combine_disjoint_fails() {
        let a = part(0.0, 1.0, 10.0, 1.0);
        let b = part(2.0, 3.0, 10.0, 2.0);
        assert!(a.combine(&b).is_err());
    }

    #[test]
    fn combine_contained_is_noop() {
        let a = part(0.0, 10.0, 10.0, 1.0);
        let b = part(2.0, 4.0, 10.0, 2.0);
        let combined = a.combine(&b).unwrap();
        assert_eq!(combined.start, a.start);
        assert_eq!(combined.end, a.end);
    }

    #[test]
    fn combine_overlapping_concatenates_tail() {
        let a = part(0.0, 2.0, 10.0, 1.0);
        let b = part(1.0, 3.0, 10.0, 2.0);
        let combined = a.combine(&b).unwrap();
        assert_eq!(combined.start, 0.0);
        assert_eq!(combined.end, 3.0);
        let data = &combined.signals[0].data;
        assert_eq!(data.len(), 30);
        assert!(data[0..10].iter().all(|&v| v == 1.0));
        assert!(data[20..30].iter().all(|&v| v == 2.0));
    }

    #[test]
    fn combine_idempotent() {
        let a = part(0.0, 5.0, 10.0, 3.0);
        let combined = a.combine(&a).unwrap();
        assert_eq!(combined, a);
    }

    #[test]
    fn continuity_true_for_contiguous_parts() {
        let a = part(0.0, 1.0, 10.0, 1.0);
        let b = part(1.0, 2.0, 10.0, 1.0);
        assert!(is_continuous_signal(&[a, b]));
    }

    #[test]
    fn continuity_false_for_gapped_parts() {
        let a = part(0.0, 1.0, 10.0, 1.0);
        let b = part(2.0, 3.0, 10.0, 1.0);
        assert!(!is_continuous_signal(&[a, b]));
    }
}
