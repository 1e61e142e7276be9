//! Interruption map and recording-time <-> cache-time conversion.

use crate::sample::{FLOAT32_EPS, NUMERIC_ERROR};
use crate::time::{CacheTime, RecordingTime};

/// `{ start (recording-time seconds), duration (seconds) }`. Ordered by `start` in [`InterruptionMap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interruption {
    pub start: f64,
    pub duration: f64,
}

/// Ascending-by-start interruption set, mutable as the reader discovers the
/// file. Kept as a sorted `Vec` rather than a float-keyed map, since
/// `start` values are never looked up by exact key -- only scanned in
/// order.
#[derive(Debug, Clone, Default)]
pub struct InterruptionMap {
    sorted: Vec<Interruption>,
}

impl InterruptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an interruption at `start`. Callers are
    /// responsible for notifying observers of the change; this type only keeps the map itself.
    pub fn set(&mut self, start: f64, duration: f64) {
        self.sorted.retain(|i| i.start != start);
        let pos = self
            .sorted
            .partition_point(|i| i.start < start);
        self.sorted.insert(pos, Interruption { start, duration });
    }

    pub fn remove(&mut self, start: f64) {
        self.sorted.retain(|i| i.start != start);
    }

    pub fn iter(&self) -> impl Iterator<Item = Interruption> + '_ {
        self.sorted.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// `recording_time = cache_time + Σ{durations of interruptions whose
    /// cache position ≤ cache_time}`. `0` and
    /// [`NUMERIC_ERROR`] map to themselves.
    pub fn cache_to_recording(&self, ct: CacheTime) -> RecordingTime {
        if ct.0 == 0.0 || ct.0 == NUMERIC_ERROR {
            return RecordingTime(ct.0);
        }
        let mut cumulative = 0.0;
        for intr in self.iter() {
            let cache_pos = intr.start - cumulative;
            if ct.0 + FLOAT32_EPS < cache_pos {
                break;
            }
            cumulative += intr.duration;
        }
        RecordingTime(ct.0 + cumulative)
    }

    /// Inverse of [`Self::cache_to_recording`]. A recording time inside a
    /// gap has no unique cache-time image; it maps to the gap's cache
    /// position (the point immediately preceding it), matching what
    /// `cache_to_recording` would report for samples right at the gap's
    /// leading edge.
    pub fn recording_to_cache(&self, rt: RecordingTime) -> CacheTime {
        if rt.0 == 0.0 || rt.0 == NUMERIC_ERROR {
            return CacheTime(rt.0);
        }
        let mut cumulative = 0.0;
        for intr in self.iter() {
            if rt.0 + FLOAT32_EPS < intr.start {
                break;
            }
            if rt.0 < intr.start + intr.duration {
                return CacheTime(intr.start - cumulative);
            }
            cumulative += intr.duration;
        }
        CacheTime(rt.0 - cumulative)
    }

    /// Overlapping interruptions trimmed to `range`, in recording-time
    /// coordinates (`useCacheTime=false`) or cache-time coordinates
    /// (`useCacheTime=true`); an interruption straddling `range.start` is
    /// reported with `start = range.start` and shortened duration.
    pub fn data_gaps(&self, start: f64, end: f64, use_cache_time: bool) -> Vec<Interruption> {
        let mut cumulative = 0.0;
        let mut gaps = Vec::new();
        for intr in self.iter() {
            let (gap_start, gap_end) = if use_cache_time {
                let pos = intr.start - cumulative;
                (pos, pos)
            } else {
                (intr.start, intr.start + intr.duration)
            };
            let gap_end = if use_cache_time { gap_start } else { gap_end };
            cumulative += intr.duration;

            if gap_end <= start || gap_start >= end {
                continue;
            }
            let trimmed_start = gap_start.max(start);
            let trimmed_duration = if use_cache_time {
                0.0
            } else {
                (gap_end.min(end)) - trimmed_start
            };
            gaps.push(Interruption {
                start: trimmed_start,
                duration: trimmed_duration,
            });
        }
        gaps
    }

    pub fn total_duration(&self) -> f64 {
        self.iter().map(|i| i.duration).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identity_at_zero_and_numeric_error() {
        let mut map = InterruptionMap::new();
        map.set(5.0, 3.0);
        assert_eq!(map.recording_to_cache(RecordingTime(0.0)).seconds(), 0.0);
        assert_eq!(
            map.cache_to_recording(CacheTime(NUMERIC_ERROR)).seconds(),
            NUMERIC_ERROR
        );
    }

    #[test]
    fn round_trip_outside_gaps() {
        let mut map = InterruptionMap::new();
        map.set(5.0, 3.0); // recording [5,8) is a gap; cache [5, total) shifts by 3
        map.set(20.0, 2.0);

        for &rt in &[1.0, 4.999, 8.0, 8.5, 19.999, 22.0, 30.0] {
            let ct = map.recording_to_cache(RecordingTime(rt));
            let back = map.cache_to_recording(ct);
            assert!(
                (back.seconds() - rt).abs() < 1e-9,
                "round trip failed for {rt}: ct={:?} back={:?}",
                ct,
                back
            );
        }
    }

    proptest! {
        #[test]
        fn bijection_outside_gaps(rt in 0.0f64..100.0) {
            let mut map = InterruptionMap::new();
            map.set(30.0, 2.0);
            map.set(60.0, 5.0);
            // Skip points that fall inside a gap -- recording_to_cache
            // collapses those non-injectively by design.
            let inside_gap = (30.0..32.0).contains(&rt) || (60.0..65.0).contains(&rt);
            prop_assume!(!inside_gap);
            let ct = map.recording_to_cache(RecordingTime(rt));
            let back = map.cache_to_recording(ct);
            prop_assert!((back.seconds() - rt).abs() < 1e-6);
        }
    }
}
