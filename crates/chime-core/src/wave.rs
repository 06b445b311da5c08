//! Decoded stereo waveforms and loop regions.
//!
//! A [`Wave`] is the unit of audio data the playback engine streams from:
//! interleaved stereo `f32` pairs at a fixed sample rate. It never changes
//! after construction, so it is shared between a voice, its feeder and its
//! one-shot instances through an `Arc`.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, Range};

use crate::error::{ChimeError, Result};

/// One stereo sample frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct WaveSample {
    pub left: f32,
    pub right: f32,
}

impl WaveSample {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[inline]
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels.
    #[inline]
    pub const fn mono(value: f32) -> Self {
        Self::new(value, value)
    }
}

/// View a run of frames as interleaved `f32` samples.
#[inline]
pub fn as_interleaved(samples: &[WaveSample]) -> &[f32] {
    bytemuck::cast_slice(samples)
}

/// Mutable interleaved view, for rendering stereo output straight into frames.
#[inline]
pub fn as_interleaved_mut(samples: &mut [WaveSample]) -> &mut [f32] {
    bytemuck::cast_slice_mut(samples)
}

/// A decoded, immutable stereo waveform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Wave {
    sample_rate: u32,
    samples: Vec<WaveSample>,
}

impl Wave {
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    /// Wrap already-decoded frames.
    pub fn new(sample_rate: u32, samples: Vec<WaveSample>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// A silent wave of `len` frames.
    pub fn silence(sample_rate: u32, len: usize) -> Self {
        Self::new(sample_rate, vec![WaveSample::ZERO; len])
    }

    /// Build a mono-sourced wave from a generator evaluated at `t` seconds.
    pub fn generate<F>(sample_rate: u32, seconds: f64, mut generator: F) -> Self
    where
        F: FnMut(f64) -> f64,
    {
        let len = (sample_rate as f64 * seconds.max(0.0)) as usize;
        let samples = (0..len)
            .map(|i| WaveSample::mono(generator(i as f64 / sample_rate as f64) as f32))
            .collect();
        Self::new(sample_rate, samples)
    }

    /// Build from interleaved stereo `f32` data. A trailing odd sample is dropped.
    pub fn from_interleaved(sample_rate: u32, data: &[f32]) -> Self {
        let samples = data
            .chunks_exact(2)
            .map(|pair| WaveSample::new(pair[0], pair[1]))
            .collect();
        Self::new(sample_rate, samples)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() || self.sample_rate == 0
    }

    /// Duration in seconds.
    pub fn length_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn samples(&self) -> &[WaveSample] {
        &self.samples
    }

    /// Frames in `range`, clamped to the wave.
    pub fn slice(&self, range: Range<usize>) -> &[WaveSample] {
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        &self.samples[start..end]
    }
}

impl Deref for Wave {
    type Target = [WaveSample];

    fn deref(&self) -> &[WaveSample] {
        &self.samples
    }
}

/// Sample range `[begin, end)` that playback repeats instead of terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopRegion {
    begin: u64,
    end: u64,
}

impl LoopRegion {
    /// Create a loop region, validating `begin < end <= wave_len`.
    pub fn new(begin: u64, end: u64, wave_len: u64) -> Result<Self> {
        if begin >= end {
            return Err(ChimeError::InvalidParameter(format!(
                "loop begin {} must be before loop end {}",
                begin, end
            )));
        }
        if end > wave_len {
            return Err(ChimeError::InvalidParameter(format!(
                "loop end {} exceeds wave length {}",
                end, wave_len
            )));
        }
        Ok(Self { begin, end })
    }

    /// Loop over the whole wave.
    pub fn whole(wave_len: u64) -> Result<Self> {
        Self::new(0, wave_len, wave_len)
    }

    #[inline]
    pub fn begin(self) -> u64 {
        self.begin
    }

    #[inline]
    pub fn end(self) -> u64 {
        self.end
    }

    #[inline]
    pub fn len(self) -> u64 {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.begin == self.end
    }

    #[inline]
    pub fn contains(self, sample: u64) -> bool {
        (self.begin..self.end).contains(&sample)
    }
}
