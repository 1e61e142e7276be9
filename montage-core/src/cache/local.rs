//! Single-context in-memory cache.

use super::part::{SignalCachePart, SignalPart};
use super::SignalDataCache;
use crate::error::CacheError;
use crate::sample::SampleRate;
use async_trait::async_trait;

/// Plain in-memory backing. Input and output getters read the same
/// storage: a local cache has no producer/consumer split, unlike the
/// shared-memory variant where a separate writer fills it.
#[derive(Debug, Default)]
pub struct LocalSignalCache {
    part: Option<SignalCachePart>,
}

impl LocalSignalCache {
    pub fn new() -> Self {
        Self { part: None }
    }
}

#[async_trait]
impl SignalDataCache for LocalSignalCache {
    async fn input_range(&self) -> (f64, f64) {
        self.output_range()
    }

    async fn input_signals(&self) -> Vec<SignalPart> {
        self.part
            .as_ref()
            .map(|p| p.signals.clone())
            .unwrap_or_default()
    }

    fn output_range(&self) -> (f64, f64) {
        self.part.as_ref().map(|p| (p.start, p.end)).unwrap_or((0.0, 0.0))
    }

    fn output_signal_sampling_rates(&self) -> Vec<SampleRate> {
        self.part
            .as_ref()
            .map(|p| p.signals.iter().map(|s| s.sampling_rate).collect())
            .unwrap_or_default()
    }

    fn output_signal_updated_ranges(&self) -> Vec<(i32, i32)> {
        self.part
            .as_ref()
            .map(|p| {
                p.signals
                    .iter()
                    .map(|s| (s.updated_start as i32, s.updated_end as i32))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert_signals(&mut self, part: &SignalCachePart) -> Result<(), CacheError> {
        match &self.part {
            None => {
                self.part = Some(part.clone());
                Ok(())
            }
            Some(current) => match current.combine(part) {
                Ok(combined) => {
                    self.part = Some(combined);
                    Ok(())
                }
                Err(err) => {
                    log::error!(target: "montage::cache", "insert_signals: combine failed: {err}");
                    Err(err)
                }
            },
        }
    }

    fn as_cache_part(&self) -> SignalCachePart {
        self.part.clone().unwrap_or_else(SignalCachePart::empty)
    }

    fn invalidate_output_signals(&mut self) {
        self.part = None;
    }

    fn release_buffers(&mut self) {
        self.part = None;
    }
}
