//! Shared-memory mutex.
//!
//! A single-writer/multi-reader lock over a contiguous region shared by
//! several execution contexts. In this single-process rewrite "execution
//! contexts" are OS threads and the "contiguous shared
//! byte region" is an `Arc`-shared [`spin::RwLock`] rather than
//! `std::sync::RwLock`: a *custom*, timeout-capable lock living alongside
//! the data it guards, not one delegated to the OS scheduler.
//!
//! Per-channel `updated_start`/`updated_end` are additionally duplicated as
//! atomics outside the `RwLock` so a reader can peek at data availability
//! without taking the lock at all.

mod descriptor;

pub use descriptor::{ChannelArraySchema, MutexDescriptor};

use crate::cache::part::{SignalCachePart, SignalPart};
use crate::error::MutexError;
use crate::sample::{round_to_samples, sampling_rate_eq, NSamples, SampleRate, EMPTY_FIELD};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Default lock-acquisition timeout.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// Per-channel allocation request for [`SharedMutex::set_data_arrays`].
#[derive(Debug, Clone, Copy)]
pub struct ChannelArrayConfig {
    pub sampling_rate: SampleRate,
    /// Sample capacity of the channel's buffer, i.e. `sampling_rate *
    /// allocated_range`.
    pub length_samples: NSamples,
}

#[derive(Debug)]
struct ChannelBuffer {
    sampling_rate: SampleRate,
    updated_start: i32,
    updated_end: i32,
    samples: Vec<f32>,
}

impl ChannelBuffer {
    fn new(sampling_rate: SampleRate, length_samples: NSamples) -> Self {
        Self {
            sampling_rate,
            updated_start: EMPTY_FIELD,
            updated_end: EMPTY_FIELD,
            samples: vec![0.0; length_samples],
        }
    }
}

#[derive(Debug)]
struct MutexData {
    allocated_range: f64,
    range_start: f64,
    range_end: f64,
    channels: Vec<ChannelBuffer>,
}

/// The shared region itself; cloned (via `Arc`) into every coupled view.
struct MutexBuffer {
    data: spin::RwLock<MutexData>,
    /// Lock-free (`updated_start`, `updated_end`) peek per channel. Filled
    /// in once by `set_data_arrays`, before the buffer is ever coupled out,
    /// so no synchronization is needed between filling it and later reads.
    progress: OnceLock<Vec<(AtomicI32, AtomicI32)>>,
}

impl MutexBuffer {
    fn progress(&self) -> &[(AtomicI32, AtomicI32)] {
        self.progress.get().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A handle onto a [`MutexBuffer`]. The writer's handle (constructed via
/// [`SharedMutex::new`] + [`SharedMutex::initialize`]) is write-capable;
/// handles reconstructed via [`SharedMutex::from_descriptor`] are
/// read-only.
pub struct SharedMutex {
    buffer: OnceLock<Arc<MutexBuffer>>,
    write_capable: bool,
}

impl SharedMutex {
    /// A fresh, write-capable mutex with no backing buffer yet.
    pub fn new() -> Self {
        Self {
            buffer: OnceLock::new(),
            write_capable: true,
        }
    }

    fn buffer(&self) -> Result<&Arc<MutexBuffer>, MutexError> {
        self.buffer.get().ok_or(MutexError::NotInitialized)
    }

    /// Attach a fresh backing region to this mutex, recording
    /// `allocated_range`. Must be called exactly once per output-side
    /// mutex; later calls are an idempotent failure.
    pub fn initialize(&self, allocated_range_seconds: f64) -> Result<(), MutexError> {
        if !self.write_capable {
            return Err(MutexError::ReadOnly);
        }
        let buffer = Arc::new(MutexBuffer {
            data: spin::RwLock::new(MutexData {
                allocated_range: allocated_range_seconds,
                range_start: 0.0,
                range_end: 0.0,
                channels: Vec::new(),
            }),
            progress: OnceLock::new(),
        });
        self.buffer
            .set(buffer)
            .map_err(|_| MutexError::AlreadyInitialized)
    }

    /// Allocate per-channel array descriptors. Immutable afterward.
    pub fn set_data_arrays(&self, configs: &[ChannelArrayConfig]) -> Result<(), MutexError> {
        if !self.write_capable {
            return Err(MutexError::ReadOnly);
        }
        let buffer = self.buffer()?;
        {
            let mut data = buffer.data.write();
            if !data.channels.is_empty() {
                return Err(MutexError::AlreadyInitialized);
            }
            data.channels = configs
                .iter()
                .map(|c| ChannelBuffer::new(c.sampling_rate, c.length_samples))
                .collect();
        }

        let progress = configs
            .iter()
            .map(|_| (AtomicI32::new(EMPTY_FIELD), AtomicI32::new(EMPTY_FIELD)))
            .collect::<Vec<_>>();
        buffer
            .progress
            .set(progress)
            .map_err(|_| MutexError::AlreadyInitialized)
    }

    fn with_timeout_read<F, R>(&self, timeout: Duration, f: F) -> Result<R, MutexError>
    where
        F: FnOnce(&MutexData) -> R,
    {
        let buffer = self.buffer()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = buffer.data.try_read() {
                return Ok(f(&guard));
            }
            if Instant::now() >= deadline {
                return Err(MutexError::LockTimeout(timeout));
            }
            std::thread::yield_now();
        }
    }

    fn with_timeout_write<F, R>(&self, timeout: Duration, f: F) -> Result<R, MutexError>
    where
        F: FnOnce(&mut MutexData) -> R,
    {
        if !self.write_capable {
            return Err(MutexError::ReadOnly);
        }
        let buffer = self.buffer()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(mut guard) = buffer.data.try_write() {
                return Ok(f(&mut guard));
            }
            if Instant::now() >= deadline {
                return Err(MutexError::LockTimeout(timeout));
            }
            std::thread::yield_now();
        }
    }

    /// Acquire the master lock in `mode` with the default timeout and run
    /// `scope`. `scope` must not itself acquire the lock; this is enforced
    /// by construction since `scope` only receives a plain reference,
    /// never `&self`.
    pub fn execute_with_lock<F, R>(&self, mode: LockMode, scope: F) -> Result<R, MutexError>
    where
        F: FnOnce(&MutexData) -> R,
    {
        match mode {
            LockMode::Read => self.with_timeout_read(DEFAULT_LOCK_TIMEOUT, scope),
            LockMode::Write => {
                self.with_timeout_write(DEFAULT_LOCK_TIMEOUT, |data| scope(data))
            }
        }
    }

    /// Non-blocking range peek: `None` if the lock is currently contended
    /// rather than waiting out the full timeout. Used by callers that only
    /// need a best-effort synchronous read.
    pub fn try_peek_range(&self) -> Option<(f64, f64)> {
        let buffer = self.buffer.get()?;
        buffer.data.try_read().map(|d| d.range())
    }

    fn set_progress(&self, channel: usize, start: i32, end: i32) {
        if let Ok(buffer) = self.buffer() {
            if let Some((s, e)) = buffer.progress().get(channel) {
                s.store(start, Ordering::Release);
                e.store(end, Ordering::Release);
            }
        }
    }

    /// Lock-free peek at a channel's `(updated_start, updated_end)` without
    /// acquiring the master lock.
    pub fn peek_updated_range(&self, channel: usize) -> Option<(i32, i32)> {
        let buffer = self.buffer.get()?;
        let (s, e) = buffer.progress().get(channel)?;
        Some((s.load(Ordering::Acquire), e.load(Ordering::Acquire)))
    }

    /// Insert a computed part into the buffer under the write lock.
    pub fn insert_signals(&self, part: &SignalCachePart) -> Result<(), MutexError> {
        let range_start = self.with_timeout_read(DEFAULT_LOCK_TIMEOUT, |d| d.range_start)?;
        let mut first_err = None;
        let updates = self.with_timeout_write(DEFAULT_LOCK_TIMEOUT, |data| {
            let range_start = data.range_start;
            let mut updates = Vec::with_capacity(data.channels.len());
            let n = data.channels.len().min(part.signals.len());
            for i in 0..n {
                let signal = &part.signals[i];
                let channel = &mut data.channels[i];
                if !sampling_rate_eq(channel.sampling_rate, signal.sampling_rate) {
                    channel.samples.iter_mut().for_each(|v| *v = 0.0);
                    if first_err.is_none() {
                        first_err = Some(MutexError::SamplingRateMismatch {
                            channel: i,
                            expected: channel.sampling_rate,
                            got: signal.sampling_rate,
                        });
                    }
                    continue;
                }

                let sr = channel.sampling_rate as f64;
                let start_pos = round_to_samples(sr * (part.start - range_start)).max(0) as usize;
                let requested_end = start_pos + signal.data.len();
                let data_len = channel.samples.len();

                let copy_len = if requested_end <= data_len {
                    signal.data.len()
                } else {
                    log::warn!(
                        target: "montage::mutex",
                        "insert_signals truncated channel {i}: requested end {requested_end} > capacity {data_len}"
                    );
                    data_len.saturating_sub(start_pos)
                };
                let start_pos = start_pos.min(data_len);
                let end_pos = (start_pos + copy_len).min(data_len);
                if start_pos < end_pos {
                    channel.samples[start_pos..end_pos]
                        .copy_from_slice(&signal.data[..end_pos - start_pos]);
                }

                let cur_start = channel.updated_start;
                let cur_end = channel.updated_end;
                let new_start = if cur_start == EMPTY_FIELD {
                    start_pos as i32
                } else {
                    cur_start.min(start_pos as i32)
                };
                let new_end = if cur_end == EMPTY_FIELD {
                    end_pos as i32
                } else {
                    cur_end.max(end_pos as i32)
                };
                channel.updated_start = new_start;
                channel.updated_end = new_end;
                updates.push((i, new_start, new_end));
            }
            updates
        })?;

        for (i, start, end) in updates {
            self.set_progress(i, start, end);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Shift/resize the buffer's active range.
    pub fn set_signal_range(&self, new_start: f64, new_end: f64) -> Result<(), MutexError> {
        let updates = self.with_timeout_write(DEFAULT_LOCK_TIMEOUT, |data| {
            let mut new_end = new_end;
            if new_end - new_start > data.allocated_range {
                new_end = new_start + data.allocated_range;
            }

            let disjoint = new_end <= data.range_start || new_start >= data.range_end;
            let (old_start, _old_end) = (data.range_start, data.range_end);
            let mut updates = Vec::with_capacity(data.channels.len());

            for (i, channel) in data.channels.iter_mut().enumerate() {
                let data_len = channel.samples.len();
                if disjoint {
                    channel.samples.iter_mut().for_each(|v| *v = 0.0);
                    channel.updated_start = EMPTY_FIELD;
                    channel.updated_end = EMPTY_FIELD;
                } else {
                    let sr = channel.sampling_rate as f64;
                    let shift = round_to_samples(sr * (new_start - old_start));
                    shift_and_clear(&mut channel.samples, shift);

                    let clamp = |v: i32| -> i32 {
                        if v == EMPTY_FIELD {
                            EMPTY_FIELD
                        } else {
                            (v as i64 - shift).clamp(0, data_len as i64) as i32
                        }
                    };
                    channel.updated_start = clamp(channel.updated_start);
                    channel.updated_end = clamp(channel.updated_end);
                    if channel.updated_start >= channel.updated_end {
                        channel.updated_start = EMPTY_FIELD;
                        channel.updated_end = EMPTY_FIELD;
                    }
                }
                updates.push((i, channel.updated_start, channel.updated_end));
            }

            data.range_start = new_start;
            data.range_end = new_end;
            updates
        })?;

        for (i, start, end) in updates {
            self.set_progress(i, start, end);
        }
        Ok(())
    }

    /// Mark listed (or all) channels as having no valid data.
    pub fn invalidate(&self, channels: Option<&[usize]>) -> Result<(), MutexError> {
        let updates = self.with_timeout_write(DEFAULT_LOCK_TIMEOUT, |data| {
            let mut updates = Vec::new();
            let targets: Vec<usize> = match channels {
                Some(cs) => cs.to_vec(),
                None => (0..data.channels.len()).collect(),
            };
            for i in targets {
                if let Some(channel) = data.channels.get_mut(i) {
                    channel.updated_start = EMPTY_FIELD;
                    channel.updated_end = EMPTY_FIELD;
                    updates.push((i, EMPTY_FIELD, EMPTY_FIELD));
                }
            }
            updates
        })?;
        for (i, start, end) in updates {
            self.set_progress(i, start, end);
        }
        Ok(())
    }

    /// Replace per-channel data wholesale, padding/truncating on length
    /// mismatch.
    pub fn write_signals(&self, signals: &[SignalPart]) -> Result<(), MutexError> {
        let updates = self.with_timeout_write(DEFAULT_LOCK_TIMEOUT, |data| {
            let mut updates = Vec::with_capacity(data.channels.len());
            let n = data.channels.len().min(signals.len());
            for i in 0..n {
                let channel = &mut data.channels[i];
                let incoming = &signals[i].data;
                let data_len = channel.samples.len();
                if incoming.len() != data_len {
                    log::warn!(
                        target: "montage::mutex",
                        "write_signals length mismatch on channel {i}: got {}, capacity {data_len}",
                        incoming.len()
                    );
                }
                let copy_len = incoming.len().min(data_len);
                channel.samples[..copy_len].copy_from_slice(&incoming[..copy_len]);
                for v in channel.samples[copy_len..].iter_mut() {
                    *v = 0.0;
                }
                channel.updated_start = 0;
                channel.updated_end = copy_len as i32;
                updates.push((i, 0, copy_len as i32));
            }
            updates
        })?;
        for (i, start, end) in updates {
            self.set_progress(i, start, end);
        }
        Ok(())
    }

    /// Produce a structure-cloneable descriptor a coupled reader can use to
    /// reconstruct a read-only view onto the same buffer.
    pub fn properties_for_coupling(&self) -> Result<MutexDescriptor, MutexError> {
        let buffer = self.buffer()?;
        let data = self.with_timeout_read(DEFAULT_LOCK_TIMEOUT, |d| {
            (
                d.allocated_range,
                d.channels
                    .iter()
                    .map(|c| ChannelArraySchema {
                        sampling_rate: c.sampling_rate,
                        length_samples: c.samples.len(),
                        type_name: "Float32Array".to_string(),
                    })
                    .collect::<Vec<_>>(),
            )
        })?;
        Ok(MutexDescriptor {
            buffer: Arc::clone(buffer),
            allocated_range: data.0,
            channels: data.1,
        })
    }

    /// Reconstruct a read-only coupled view from a descriptor.
    pub fn from_descriptor(descriptor: MutexDescriptor) -> Result<Self, MutexError> {
        descriptor.verify_schema()?;
        let mutex = Self {
            buffer: OnceLock::new(),
            write_capable: false,
        };
        mutex
            .buffer
            .set(descriptor.buffer)
            .map_err(|_| MutexError::AlreadyInitialized)?;
        Ok(mutex)
    }

    pub fn is_write_capable(&self) -> bool {
        self.write_capable
    }
}

impl Default for SharedMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Shift a sample buffer in place by `shift` samples (positive shifts data
/// toward index 0, i.e. the window moved forward in time), zeroing the
/// vacated region. Used by `set_signal_range`.
fn shift_and_clear(buffer: &mut [f32], shift: i64) {
    let len = buffer.len() as i64;
    if shift == 0 || shift.abs() >= len {
        if shift.abs() >= len {
            buffer.iter_mut().for_each(|v| *v = 0.0);
        }
        return;
    }
    if shift > 0 {
        let shift = shift as usize;
        buffer.copy_within(shift.., 0);
        buffer[len as usize - shift..].iter_mut().for_each(|v| *v = 0.0);
    } else {
        let shift = (-shift) as usize;
        buffer.copy_within(..len as usize - shift, shift);
        buffer[..shift].iter_mut().for_each(|v| *v = 0.0);
    }
}

impl MutexData {
    pub fn range(&self) -> (f64, f64) {
        (self.range_start, self.range_end)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_updated_range(&self, channel: usize) -> Option<(i32, i32)> {
        self.channels
            .get(channel)
            .map(|c| (c.updated_start, c.updated_end))
    }

    pub fn channel_samples(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(|c| c.samples.as_slice())
    }

    pub fn channel_sampling_rate(&self, channel: usize) -> Option<SampleRate> {
        self.channels.get(channel).map(|c| c.sampling_rate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_mutex(sr: f32, allocated_range: f64) -> SharedMutex {
        let mutex = SharedMutex::new();
        mutex.initialize(allocated_range).unwrap();
        mutex
            .set_data_arrays(&[ChannelArrayConfig {
                sampling_rate: sr,
                length_samples: (sr as f64 * allocated_range) as usize,
            }])
            .unwrap();
        mutex
    }

    #[test]
    fn insert_signals_updates_progress_lock_free() {
        let mutex = make_mutex(10.0, 10.0);
        mutex.set_signal_range(0.0, 10.0).unwrap();
        let part = SignalCachePart {
            start: 0.0,
            end: 1.0,
            signals: vec![SignalPart::full(10.0, vec![1.0; 10])],
        };
        mutex.insert_signals(&part).unwrap();
        assert_eq!(mutex.peek_updated_range(0), Some((0, 10)));
    }

    #[test]
    fn sampling_rate_mismatch_zeros_channel() {
        let mutex = make_mutex(10.0, 10.0);
        mutex.set_signal_range(0.0, 10.0).unwrap();
        let part = SignalCachePart {
            start: 0.0,
            end: 1.0,
            signals: vec![SignalPart::full(20.0, vec![5.0; 20])],
        };
        let err = mutex.insert_signals(&part);
        assert!(matches!(err, Err(MutexError::SamplingRateMismatch { .. })));
    }

    #[test]
    fn coupled_view_is_read_only() {
        let mutex = make_mutex(10.0, 10.0);
        let descriptor = mutex.properties_for_coupling().unwrap();
        let coupled = SharedMutex::from_descriptor(descriptor).unwrap();
        assert!(!coupled.is_write_capable());
        let part = SignalCachePart {
            start: 0.0,
            end: 1.0,
            signals: vec![SignalPart::full(10.0, vec![1.0; 10])],
        };
        assert_eq!(coupled.insert_signals(&part), Err(MutexError::ReadOnly));
    }

    #[test]
    fn set_signal_range_disjoint_zeros_buffer() {
        let mutex = make_mutex(10.0, 10.0);
        mutex.set_signal_range(0.0, 10.0).unwrap();
        let part = SignalCachePart {
            start: 0.0,
            end: 1.0,
            signals: vec![SignalPart::full(10.0, vec![7.0; 10])],
        };
        mutex.insert_signals(&part).unwrap();
        mutex.set_signal_range(100.0, 110.0).unwrap();
        assert_eq!(mutex.peek_updated_range(0), Some((EMPTY_FIELD, EMPTY_FIELD)));
    }
}
