//! Montage processor. The DSP heart: the
//! `calculate_signals_for_part`/`get_signals` pair below implement the
//! six-step montage computation, including the interruption-aware filter
//! padding and the final recording-time zero-padding reassembly.

use super::filter::{compute_padding, FilterSet};
use super::{ChannelSource, Montage};
use crate::cache::{LocalSignalCache, SignalCache, SignalCachePart, SignalDataCache, SignalPart};
use crate::error::ProcessorError;
use crate::reader::InterruptionMap;
use crate::sample::round_to_samples;
use crate::settings::MontageSettings;
use crate::time::RecordingTime;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// `config.include` (priority) or `config.exclude` channel selection.
#[derive(Debug, Clone, Default)]
pub struct GetSignalsConfig {
    pub include: Option<Vec<usize>>,
    pub exclude: Option<Vec<usize>>,
}

impl GetSignalsConfig {
    fn select(&self, channel_count: usize) -> Vec<usize> {
        if let Some(include) = &self.include {
            include.clone()
        } else if let Some(exclude) = &self.exclude {
            (0..channel_count).filter(|i| !exclude.contains(i)).collect()
        } else {
            (0..channel_count).collect()
        }
    }
}

/// Computes derived channels from raw input signals.
/// Owns its output cache exclusively; the
/// input cache is owned by a reader and only borrowed here.
pub struct MontageProcessor {
    montage: Montage,
    input: Option<Arc<RwLock<SignalCache>>>,
    output: SignalCache,
    global_filters: FilterSet,
    settings: Arc<MontageSettings>,
}

impl MontageProcessor {
    pub fn new(montage: Montage, settings: Arc<MontageSettings>) -> Self {
        Self {
            montage,
            input: None,
            output: SignalCache::Local(LocalSignalCache::new()),
            global_filters: FilterSet::default(),
            settings,
        }
    }

    pub fn montage(&self) -> &Montage {
        &self.montage
    }

    pub fn montage_mut(&mut self) -> &mut Montage {
        &mut self.montage
    }

    pub fn set_input(&mut self, input: Arc<RwLock<SignalCache>>) {
        self.input = Some(input);
    }

    pub fn output_cache(&self) -> &SignalCache {
        &self.output
    }

    /// Set the processor-wide filter defaults. Always invalidates the
    /// output cache.
    pub fn set_global_filters(&mut self, filters: FilterSet) {
        self.global_filters = filters;
        self.output.invalidate_output_signals();
    }

    /// Set per-channel filter overrides for `channels` (or, if empty, every
    /// channel). Always invalidates the output cache.
    pub fn set_channel_filters(&mut self, channels: &[usize], filters: FilterSet) {
        let targets: Vec<usize> = if channels.is_empty() {
            (0..self.montage.channels.len()).collect()
        } else {
            channels.to_vec()
        };
        for idx in targets {
            if let Some(channel) = self.montage.channels.get_mut(idx) {
                channel.highpass = filters.highpass;
                channel.lowpass = filters.lowpass;
                channel.notch = filters.notch;
                channel.bandreject = Some(filters.bandreject.clone());
            }
        }
        self.output.invalidate_output_signals();
    }

    /// `shouldFilterSignal`: whether any filter is active for `channel`
    /// once resolved against the global defaults.
    fn effective_filters(&self, channel: &super::MontageChannel) -> FilterSet {
        channel.effective_filters(&self.global_filters)
    }

    /// `calculateSignalsForPart`. Returns a part whose
    /// `start`/`end` are expressed in *cache time* (the axis the input
    /// cache itself is indexed on); `get_signals` is responsible for
    /// reassembling it into a fixed-length, recording-time-addressed,
    /// interruption-zero-padded buffer.
    pub async fn calculate_signals_for_part(
        &mut self,
        start: f64,
        end: f64,
        cache_it: bool,
        interruptions: &InterruptionMap,
        total_recording_length: f64,
        config: &GetSignalsConfig,
    ) -> Result<SignalCachePart, ProcessorError> {
        let input = self.input.clone().ok_or(ProcessorError::NoInputCache)?;
        let input_guard = input.read().await;
        let (input_range_start, input_range_end) = input_guard.input_range().await;

        let raw_cache_start = interruptions.recording_to_cache(RecordingTime(start)).seconds();
        let raw_cache_end = interruptions
            .recording_to_cache(RecordingTime(end.min(total_recording_length)))
            .seconds();

        if raw_cache_start < input_range_start || raw_cache_end > input_range_end {
            return Err(ProcessorError::NotLoadedYet);
        }

        let cache_start = raw_cache_start.max(0.0).max(input_range_start);
        let cache_end = raw_cache_end.min(input_range_end);
        let rel_start = cache_start - input_range_start;
        let rel_end = cache_end - input_range_start;

        let channels = config.select(self.montage.channels.len());
        let input_signals = input_guard.input_signals().await;
        drop(input_guard);

        let padding_seconds = self.settings.filter_padding_seconds;
        let total_data_seconds = input_range_end - input_range_start;

        let mut signals = Vec::with_capacity(channels.len());
        for &ch_idx in &channels {
            let Some(channel) = self.montage.channels.get(ch_idx) else {
                continue;
            };

            if !channel.visible {
                signals.push(SignalPart::empty(channel.sampling_rate, 0));
                continue;
            }

            let sr = channel.sampling_rate as f64;
            let range_start = round_to_samples(sr * rel_start).max(0) as usize;
            let range_end = round_to_samples(sr * rel_end).max(0) as usize;
            let active_len_samples = round_to_samples(sr * total_data_seconds).max(0) as usize;

            if range_end <= range_start {
                // Step 5b: the whole requested window collapsed into a
                // single interruption once mapped to cache time.
                signals.push(SignalPart::empty(channel.sampling_rate, 0));
                continue;
            }

            let filters = self.effective_filters(channel);

            let seams = interruption_seams(interruptions, sr as f32, active_len_samples, padding_seconds);
            let padding = compute_padding(
                range_start,
                range_end,
                active_len_samples,
                padding_seconds,
                channel.sampling_rate,
                &seams,
            );

            let reference_entries: Vec<(usize, f64)> = channel.reference.weighted_entries();

            let buf_len = padding.data_end.saturating_sub(padding.data_start);
            let mut buffer = vec![0.0f32; buf_len];
            let mut avg_cache: HashMap<String, f64> = HashMap::new();

            for n in padding.data_start..padding.data_end {
                if n >= active_len_samples {
                    continue;
                }

                let act_avg = match &channel.active {
                    ChannelSource::Single(idx) => sample_at(&input_signals, *idx, n),
                    ChannelSource::Weighted(list) if list.is_empty() => 0.0,
                    ChannelSource::Weighted(list) => {
                        let sum: f64 = list
                            .iter()
                            .map(|(idx, w)| sample_at(&input_signals, *idx, n) * w)
                            .sum();
                        sum / list.len() as f64
                    }
                };

                let ref_count = reference_entries.len();
                let mut ref_avg = if ref_count == 0 {
                    0.0
                } else if channel.averaged {
                    let key = format!("{reference_entries:?}:{n}");
                    *avg_cache.entry(key).or_insert_with(|| {
                        let sum: f64 = reference_entries
                            .iter()
                            .map(|(idx, w)| sample_at(&input_signals, *idx, n) * w)
                            .sum();
                        sum / ref_count as f64
                    })
                } else {
                    let sum: f64 = reference_entries
                        .iter()
                        .map(|(idx, w)| sample_at(&input_signals, *idx, n) * w)
                        .sum();
                    sum / ref_count as f64
                };

                if channel.exclude_active_from_avg && ref_count > 1 {
                    ref_avg = (ref_avg - act_avg / ref_count as f64) * (ref_count as f64 / (ref_count as f64 - 1.0));
                }

                buffer[n - padding.data_start] = (act_avg - ref_avg) as f32;
            }

            if filters.is_active() {
                apply_filter_with_gap_splicing(&filters, channel.sampling_rate, &mut buffer, &seams, padding.data_start);
            }
            let trim_start = range_start.saturating_sub(padding.data_start);
            let trim_end = trim_start + (range_end - range_start);
            let final_data = buffer
                .get(trim_start..trim_end.min(buffer.len()))
                .unwrap_or(&[])
                .to_vec();

            signals.push(SignalPart::full(channel.sampling_rate, final_data));
        }

        let part = SignalCachePart {
            start: cache_start,
            end: cache_end,
            signals,
        };

        if cache_it {
            self.output.insert_signals(&part).map_err(ProcessorError::Cache)?;
        }

        Ok(part)
    }

    /// `get_signals`: reuse the output cache when
    /// possible, else compute, then reassemble a fixed-length
    /// recording-time buffer with interruption regions zero-padded.
    pub async fn get_signals(
        &mut self,
        start: f64,
        end: f64,
        config: &GetSignalsConfig,
        interruptions: &InterruptionMap,
        total_recording_length: f64,
    ) -> Result<SignalCachePart, ProcessorError> {
        if self.settings.pre_cache {
            let (out_start, out_end) = self.output.output_range();
            if out_start <= start && out_end >= end && out_end > out_start {
                return Ok(filter_part_channels(&self.output.as_cache_part(), config));
            }
        }

        let computed = self
            .calculate_signals_for_part(start, end, false, interruptions, total_recording_length, config)
            .await?;

        let gaps = interruptions.data_gaps(start, end, false);
        if gaps.is_empty() {
            return Ok(SignalCachePart {
                start,
                end,
                signals: computed.signals,
            });
        }

        let mut signals = Vec::with_capacity(computed.signals.len());
        for signal in computed.signals {
            let sr = signal.sampling_rate as f64;
            let total_len = round_to_samples(sr * (end - start)).max(0) as usize;
            let mut out = vec![0.0f32; total_len];

            for i in 0..total_len {
                let rt = start + i as f64 / sr;
                if gaps.iter().any(|g| rt >= g.start && rt < g.start + g.duration) {
                    continue;
                }
                let ct = interruptions.recording_to_cache(RecordingTime(rt)).seconds();
                let offset = round_to_samples(sr * (ct - computed.start));
                if offset >= 0 && (offset as usize) < signal.data.len() {
                    out[i] = signal.data[offset as usize];
                }
            }
            signals.push(SignalPart::full(signal.sampling_rate, out));
        }

        Ok(SignalCachePart { start, end, signals })
    }
}

fn sample_at(signals: &[SignalPart], idx: usize, n: usize) -> f64 {
    signals
        .get(idx)
        .and_then(|s| s.data.get(n))
        .copied()
        .unwrap_or(0.0) as f64
}

fn filter_part_channels(part: &SignalCachePart, config: &GetSignalsConfig) -> SignalCachePart {
    let indices = config.select(part.signals.len());
    SignalCachePart {
        start: part.start,
        end: part.end,
        signals: indices
            .into_iter()
            .filter_map(|i| part.signals.get(i).cloned())
            .collect(),
    }
}

/// Interruption seams relative to a channel's full active-signal sample
/// axis, width-capped at the padding length.
fn interruption_seams(
    interruptions: &InterruptionMap,
    sampling_rate: f32,
    active_len_samples: usize,
    padding_seconds: f64,
) -> Vec<(usize, usize)> {
    let filter_len = (padding_seconds * sampling_rate as f64).round().max(0.0) as usize;
    let mut cumulative = 0.0;
    let mut seams = Vec::new();
    for intr in interruptions.iter() {
        let cache_pos = (intr.start - cumulative).max(0.0);
        let seam = (cache_pos * sampling_rate as f64).round().max(0.0) as usize;
        if seam < active_len_samples {
            let width = ((intr.duration * sampling_rate as f64).round().max(0.0) as usize).min(filter_len);
            seams.push((seam, (seam + width).min(active_len_samples)));
        }
        cumulative += intr.duration;
    }
    seams
}

/// Splice zero samples at each seam before filtering, filter, then remove
/// the spliced spans in reverse order.
fn apply_filter_with_gap_splicing(
    filters: &FilterSet,
    sampling_rate: f32,
    buffer: &mut Vec<f32>,
    seams: &[(usize, usize)],
    window_start: usize,
) {
    let mut local_seams: Vec<(usize, usize)> = seams
        .iter()
        .filter_map(|&(s, e)| {
            if e <= window_start || s >= window_start + buffer.len() {
                None
            } else {
                Some((s.saturating_sub(window_start), e.saturating_sub(window_start)))
            }
        })
        .collect();
    local_seams.sort_by_key(|&(s, _)| s);

    let mut inserted = Vec::with_capacity(local_seams.len());
    let mut offset = 0usize;
    for &(s, e) in &local_seams {
        let pos = (s + offset).min(buffer.len());
        let width = e.saturating_sub(s);
        if width == 0 {
            continue;
        }
        buffer.splice(pos..pos, std::iter::repeat(0.0f32).take(width));
        inserted.push((pos, width));
        offset += width;
    }

    let mut cascade = filters.build_cascade(sampling_rate);
    if !cascade.is_empty() {
        cascade.filtfilt(buffer);
    }

    for &(pos, width) in inserted.iter().rev() {
        buffer.splice(pos..pos + width, std::iter::empty());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::montage::MontageChannel;

    fn simple_channel(name: &str, active: ChannelSource, reference: ChannelSource) -> MontageChannel {
        MontageChannel {
            name: name.to_string(),
            sampling_rate: 100.0,
            active,
            reference,
            averaged: false,
            exclude_active_from_avg: false,
            visible: true,
            highpass: None,
            lowpass: None,
            notch: None,
            bandreject: None,
        }
    }

    async fn setup(input_signals: Vec<SignalPart>, channel: MontageChannel) -> MontageProcessor {
        let mut local = LocalSignalCache::new();
        let len = input_signals.first().map(|s| s.data.len()).unwrap_or(0);
        local
            .insert_signals(&SignalCachePart {
                start: 0.0,
                end: len as f64 / 100.0,
                signals: input_signals,
            })
            .unwrap();

        let mut montage = Montage::new("test");
        montage.channels.push(channel);

        let mut settings = MontageSettings::default();
        settings.filter_padding_seconds = 0.0;
        let mut processor = MontageProcessor::new(montage, Arc::new(settings));
        processor.set_input(Arc::new(RwLock::new(SignalCache::Local(local))));
        processor
    }

    #[tokio::test]
    async fn s1_identity_montage_no_filters() {
        let x: Vec<f32> = (0..1000).map(|i| i as f32 / 100.0).collect();
        let channel = simple_channel("ch0", ChannelSource::Single(0), ChannelSource::Weighted(vec![]));
        let mut processor = setup(vec![SignalPart::full(100.0, x.clone())], channel).await;

        let interruptions = InterruptionMap::new();
        let config = GetSignalsConfig::default();
        let result = processor
            .get_signals(0.0, 10.0, &config, &interruptions, 10.0)
            .await
            .unwrap();

        assert_eq!(result.signals[0].data.len(), 1000);
        for (i, &v) in result.signals[0].data.iter().enumerate() {
            assert!((v - x[i]).abs() < 1e-4, "sample {i}: {v} vs {}", x[i]);
        }
    }

    #[tokio::test]
    async fn s2_subtract_reference() {
        let x0 = vec![1.0f32; 100];
        let x1 = vec![0.4f32; 100];
        let channel = simple_channel("ch0", ChannelSource::Single(0), ChannelSource::Single(1));
        let mut processor = setup(vec![SignalPart::full(100.0, x0), SignalPart::full(100.0, x1)], channel).await;

        let interruptions = InterruptionMap::new();
        let config = GetSignalsConfig::default();
        let result = processor
            .get_signals(0.0, 1.0, &config, &interruptions, 1.0)
            .await
            .unwrap();

        assert_eq!(result.signals[0].data.len(), 100);
        for &v in &result.signals[0].data {
            assert!((v - 0.6).abs() < 1e-4, "{v}");
        }
    }

    #[tokio::test]
    async fn s3_averaged_reference() {
        let x0 = vec![1.0f32; 100];
        let x1 = vec![0.2f32; 100];
        let x2 = vec![0.4f32; 100];
        let mut channel = simple_channel(
            "ch0",
            ChannelSource::Single(0),
            ChannelSource::Weighted(vec![(1, 1.0), (2, 1.0)]),
        );
        channel.averaged = true;
        let mut processor = setup(
            vec![SignalPart::full(100.0, x0), SignalPart::full(100.0, x1), SignalPart::full(100.0, x2)],
            channel,
        )
        .await;

        let interruptions = InterruptionMap::new();
        let config = GetSignalsConfig::default();
        let result = processor
            .get_signals(0.0, 1.0, &config, &interruptions, 1.0)
            .await
            .unwrap();

        for &v in &result.signals[0].data {
            assert!((v - 0.7).abs() < 1e-4, "{v}");
        }
    }

    #[tokio::test]
    async fn s4_interruption_zero_pad() {
        let x = vec![1.0f32; 1700]; // 20s - 3s gap = 17s of cache-time data at 100Hz
        let channel = simple_channel("ch0", ChannelSource::Single(0), ChannelSource::Weighted(vec![]));
        let mut processor = setup(vec![SignalPart::full(100.0, x)], channel).await;

        let mut interruptions = InterruptionMap::new();
        interruptions.set(5.0, 3.0);

        let config = GetSignalsConfig::default();
        let result = processor
            .get_signals(4.0, 10.0, &config, &interruptions, 20.0)
            .await
            .unwrap();

        let data = &result.signals[0].data;
        assert_eq!(data.len(), 600);
        assert!(data[0..100].iter().all(|&v| v == 1.0));
        assert!(data[100..400].iter().all(|&v| v == 0.0));
        assert!(data[400..600].iter().all(|&v| v == 1.0));
    }
}
