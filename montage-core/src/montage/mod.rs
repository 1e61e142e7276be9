//! Montage model.

pub mod filter;
pub mod processor;

pub use filter::FilterSet;
pub use processor::{GetSignalsConfig, MontageProcessor};

use crate::sample::SampleRate;
use serde::{Deserialize, Serialize};

/// Either a single raw-channel index or a weighted list of them (spec
/// section 3: "`active` and `reference` are each either a single source
/// channel index or a list of `(index, weight)` pairs").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelSource {
    Single(usize),
    Weighted(Vec<(usize, f64)>),
}

impl ChannelSource {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Weighted(v) if v.is_empty())
    }

    /// `(index, weight)` pairs, giving an implicit weight of `1.0` to a
    /// `Single` source.
    pub fn weighted_entries(&self) -> Vec<(usize, f64)> {
        match self {
            Self::Single(idx) => vec![(*idx, 1.0)],
            Self::Weighted(list) => list.clone(),
        }
    }
}

/// A derived channel. `highpass`/`lowpass`/`notch`/
/// `bandreject` are per-channel overrides of the processor's global
/// filter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MontageChannel {
    pub name: String,
    pub sampling_rate: SampleRate,
    pub active: ChannelSource,
    pub reference: ChannelSource,
    /// Cache the reference average per sample index across channels that
    /// share it, to avoid recomputation.
    pub averaged: bool,
    /// Correct the average to exclude the active signal's own
    /// contribution when it's also one of the references.
    pub exclude_active_from_avg: bool,
    /// Included in responses per [`crate::settings::ChannelDisplayPolicy`]
    /// when `false`.
    pub visible: bool,
    #[serde(default)]
    pub highpass: Option<f64>,
    #[serde(default)]
    pub lowpass: Option<f64>,
    #[serde(default)]
    pub notch: Option<f64>,
    #[serde(default)]
    pub bandreject: Option<Vec<(f64, f64)>>,
}

impl MontageChannel {
    /// Resolve this channel's effective filters against the processor's
    /// global defaults: per-channel override if
    /// present, else the global value.
    pub fn effective_filters(&self, global: &FilterSet) -> FilterSet {
        FilterSet {
            highpass: self.highpass.or(global.highpass),
            lowpass: self.lowpass.or(global.lowpass),
            notch: self.notch.or(global.notch),
            bandreject: self
                .bandreject
                .clone()
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| global.bandreject.clone()),
        }
    }
}

/// An ordered set of derived channels with shared filter defaults and an
/// optional common reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Montage {
    pub name: String,
    pub channels: Vec<MontageChannel>,
}

impl Montage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }
}
