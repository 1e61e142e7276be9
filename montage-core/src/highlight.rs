//! Highlights/annotations.
//!
//! Storage and rendering of highlights are out of scope;
//! this module only carries the shapes the reader serves alongside signal
//! responses and the `getAnnotations` filter.

use serde::{Deserialize, Serialize};

/// `{ type, start, end, channels: sorted int[] }`; identity is the whole
/// tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(rename = "type")]
    pub kind: String,
    pub start: i64,
    pub end: i64,
    pub channels: Vec<usize>,
}

impl Highlight {
    pub fn new(kind: impl Into<String>, start: i64, end: i64, mut channels: Vec<usize>) -> Self {
        channels.sort_unstable();
        Self {
            kind: kind.into(),
            start,
            end,
            channels,
        }
    }
}

/// `{ name -> { highlights: Highlight[] } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighlightContext {
    pub highlights: Vec<Highlight>,
}

impl HighlightContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, highlight: Highlight) {
        if !self.highlights.contains(&highlight) {
            self.highlights.push(highlight);
        }
    }

    /// `getAnnotations(range)`: highlights with `range.start <= start <
    /// range.end`.
    pub fn annotations_in(&self, start: i64, end: i64) -> Vec<&Highlight> {
        self.highlights
            .iter()
            .filter(|h| h.start >= start && h.start < end)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn annotations_in_filters_by_start_only() {
        let mut ctx = HighlightContext::new();
        ctx.insert(Highlight::new("spike", 5, 10, vec![0, 1]));
        ctx.insert(Highlight::new("spike", 15, 20, vec![0]));
        let found = ctx.annotations_in(0, 12);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 5);
    }
}
