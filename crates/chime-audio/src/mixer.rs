//! Software mixer: sums streaming source voices into the device output.
//!
//! Every non-null backend owns one [`Mixer`]. Source voices queue frames in a
//! lock-free [`RingBuffer`]; the render path steps through them at
//! `frequency_ratio * voice_rate / device_rate` (zero-order hold), applies the
//! per-channel gains, then the master volume and a hard clamp.

use crate::backend::{HardwareVoice, VoiceFormat};
use crate::ring_buffer::RingBuffer;
use chime_core::limits::MIN_FREQUENCY_RATIO;
use chime_core::{ChimeError, Result, WaveSample};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// No end-of-stream marker queued.
const NO_END: u64 = u64::MAX;

/// Output limiter threshold in linear amplitude.
const LIMIT: f32 = 1.0;

#[derive(Debug, Default)]
struct RenderState {
    /// Frame currently being held on the output.
    current: Option<WaveSample>,
    /// Fractional progress through `current`.
    phase: f64,
}

/// A streaming source voice mixed in software.
pub struct SourceVoice {
    format: VoiceFormat,
    queue: RingBuffer,
    submitted: AtomicU64,
    played: AtomicU64,
    end_at: AtomicU64,
    running: AtomicBool,
    destroyed: AtomicBool,
    stream_end: AtomicBool,
    gain_left: AtomicU32,
    gain_right: AtomicU32,
    ratio: AtomicU64,
    render: Mutex<RenderState>,
}

impl SourceVoice {
    pub fn new(format: VoiceFormat) -> Self {
        Self {
            format,
            queue: RingBuffer::new(format.queue_frames),
            submitted: AtomicU64::new(0),
            played: AtomicU64::new(0),
            end_at: AtomicU64::new(NO_END),
            running: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            stream_end: AtomicBool::new(false),
            gain_left: AtomicU32::new(1.0f32.to_bits()),
            gain_right: AtomicU32::new(1.0f32.to_bits()),
            ratio: AtomicU64::new(1.0f64.to_bits()),
            render: Mutex::new(RenderState::default()),
        }
    }

    pub fn format(&self) -> VoiceFormat {
        self.format
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn finish_stream(&self, state: &mut RenderState) {
        state.current = None;
        state.phase = 0.0;
        self.end_at.store(NO_END, Ordering::Release);
        self.running.store(false, Ordering::Release);
        self.stream_end.store(true, Ordering::Release);
    }

    /// Add this voice's contribution to `output` (interleaved, `channels` wide).
    pub fn render_into(&self, output: &mut [f32], channels: usize, device_rate: u32) {
        if channels == 0 || device_rate == 0 || !self.running.load(Ordering::Acquire) {
            return;
        }
        let step = self.frequency_ratio() * self.format.sample_rate as f64 / device_rate as f64;
        let (gain_left, gain_right) = self.channel_volumes();

        let mut state = self.render.lock();
        for frame in output.chunks_exact_mut(channels) {
            if state.current.is_none() {
                state.current = self.queue.pop();
            }
            let Some(sample) = state.current else {
                // Underrun: silence until more frames arrive.
                break;
            };
            mix_frame(frame, sample.left * gain_left, sample.right * gain_right);

            state.phase += step;
            while state.phase >= 1.0 {
                state.phase -= 1.0;
                let played = self.played.fetch_add(1, Ordering::AcqRel) + 1;
                if played >= self.end_at.load(Ordering::Acquire) {
                    self.finish_stream(&mut state);
                    return;
                }
                state.current = self.queue.pop();
                if state.current.is_none() {
                    state.phase = 0.0;
                    break;
                }
            }
        }
    }
}

fn mix_frame(frame: &mut [f32], left: f32, right: f32) {
    match frame {
        [mono] => *mono += (left + right) * 0.5,
        [l, r, ..] => {
            *l += left;
            *r += right;
        }
        [] => {}
    }
}

impl HardwareVoice for SourceVoice {
    fn start(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(ChimeError::Hardware("voice already destroyed".into()));
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn flush(&self) {
        let mut state = self.render.lock();
        self.queue.clear();
        state.current = None;
        state.phase = 0.0;
        self.end_at.store(NO_END, Ordering::Release);
        self.submitted
            .store(self.played.load(Ordering::Acquire), Ordering::Release);
    }

    fn destroy(&self) {
        self.stop();
        self.flush();
        self.destroyed.store(true, Ordering::Release);
    }

    fn submit(&self, frames: &[WaveSample], end_of_stream: bool) -> usize {
        if self.is_destroyed() {
            return 0;
        }
        let accepted = self.queue.write(frames);
        let submitted = self.submitted.fetch_add(accepted as u64, Ordering::AcqRel) + accepted as u64;

        if end_of_stream && accepted == frames.len() {
            self.end_at.store(submitted, Ordering::Release);
            if self.played.load(Ordering::Acquire) >= submitted {
                // Nothing left to play before the marker.
                let mut state = self.render.lock();
                self.finish_stream(&mut state);
            }
        }
        accepted
    }

    fn samples_played(&self) -> u64 {
        self.played.load(Ordering::Acquire)
    }

    fn queued_samples(&self) -> usize {
        let submitted = self.submitted.load(Ordering::Acquire);
        submitted.saturating_sub(self.played.load(Ordering::Acquire)) as usize
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn take_stream_end(&self) -> bool {
        self.stream_end.swap(false, Ordering::AcqRel)
    }

    fn set_channel_volumes(&self, left: f32, right: f32) {
        self.gain_left.store(left.to_bits(), Ordering::Relaxed);
        self.gain_right.store(right.to_bits(), Ordering::Relaxed);
    }

    fn channel_volumes(&self) -> (f32, f32) {
        (
            f32::from_bits(self.gain_left.load(Ordering::Relaxed)),
            f32::from_bits(self.gain_right.load(Ordering::Relaxed)),
        )
    }

    fn set_frequency_ratio(&self, ratio: f64) {
        let (min, max) = self.frequency_ratio_range();
        let ratio = if ratio.is_nan() { 1.0 } else { ratio };
        self.ratio
            .store(ratio.clamp(min, max).to_bits(), Ordering::Relaxed);
    }

    fn frequency_ratio(&self) -> f64 {
        f64::from_bits(self.ratio.load(Ordering::Relaxed))
    }

    fn frequency_ratio_range(&self) -> (f64, f64) {
        (
            MIN_FREQUENCY_RATIO,
            self.format.max_frequency_ratio.max(MIN_FREQUENCY_RATIO),
        )
    }
}

/// Mixes every live source voice into interleaved device output.
pub struct Mixer {
    sample_rate: u32,
    channels: u16,
    voices: Mutex<Vec<Arc<SourceVoice>>>,
    master_volume: AtomicU64,
    closed: AtomicBool,
}

impl Mixer {
    /// Create a mixer for a device running at `sample_rate` with `channels` outputs.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            voices: Mutex::new(Vec::new()),
            master_volume: AtomicU64::new(1.0f64.to_bits()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Create a source voice and attach it to the mix.
    pub fn add_voice(&self, format: VoiceFormat) -> Result<Arc<SourceVoice>> {
        format.validate()?;
        if self.closed.load(Ordering::Acquire) {
            return Err(ChimeError::DeviceUnavailable("mixer is shut down".into()));
        }
        let voice = Arc::new(SourceVoice::new(format));
        self.voices.lock().push(Arc::clone(&voice));
        Ok(voice)
    }

    /// Number of attached voices that have not been destroyed.
    pub fn voice_count(&self) -> usize {
        self.voices
            .lock()
            .iter()
            .filter(|v| !v.is_destroyed())
            .count()
    }

    pub fn set_master_volume(&self, volume: f64) {
        self.master_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn master_volume(&self) -> f64 {
        f64::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    /// Fill `output` (interleaved, [`Self::channels`] wide) with the next block.
    pub fn render(&self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.channels as usize;
        {
            let mut voices = self.voices.lock();
            voices.retain(|v| !v.is_destroyed());
            for voice in voices.iter() {
                voice.render_into(output, channels, self.sample_rate);
            }
        }

        let master = self.master_volume() as f32;
        for s in output.iter_mut() {
            *s = (*s * master).clamp(-LIMIT, LIMIT);
        }
    }

    /// Destroy every voice and refuse new ones.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        for voice in self.voices.lock().drain(..) {
            voice.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(rate: u32, queue: usize) -> VoiceFormat {
        VoiceFormat::new(rate, 2.0, queue)
    }

    fn ramp(len: usize) -> Vec<WaveSample> {
        (0..len)
            .map(|i| WaveSample::mono(i as f32 / 100.0))
            .collect()
    }

    #[test]
    fn test_mixer_basic() {
        let mixer = Mixer::new(1000, 2);
        let a = mixer.add_voice(format(1000, 64)).unwrap();
        let b = mixer.add_voice(format(1000, 64)).unwrap();
        a.submit(&[WaveSample::mono(0.5); 4], false);
        b.submit(&[WaveSample::mono(0.3); 4], false);
        a.start().unwrap();
        b.start().unwrap();

        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out);
        for s in &out {
            assert!((s - 0.8).abs() < 1e-6);
        }
        assert_eq!(a.samples_played(), 4);
    }

    #[test]
    fn test_stopped_voice_is_silent_and_keeps_queue() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.submit(&ramp(10), false);

        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(voice.samples_played(), 0);
        assert_eq!(voice.queued_samples(), 10);
    }

    #[test]
    fn test_channel_gains_applied() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.set_channel_volumes(0.25, 0.0);
        voice.submit(&[WaveSample::mono(1.0); 2], false);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 4];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.25, 0.0, 0.25, 0.0]);
    }

    #[test]
    fn test_mixer_limiter() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.submit(&[WaveSample::mono(2.0); 4], false);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out);
        for s in &out {
            assert!(s.abs() <= 1.0);
        }
    }

    #[test]
    fn test_master_volume() {
        let mixer = Mixer::new(1000, 1);
        mixer.set_master_volume(0.5);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.submit(&[WaveSample::new(0.4, 0.8); 2], false);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 2];
        mixer.render(&mut out);
        // Mono downmix of (0.4, 0.8) at half volume.
        assert!((out[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_end_of_stream_stops_voice() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        assert_eq!(voice.submit(&ramp(5), true), 5);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 20];
        mixer.render(&mut out);
        assert_eq!(voice.samples_played(), 5);
        assert!(!voice.is_running());
        assert!(voice.take_stream_end());
        assert!(!voice.take_stream_end());
        // Frames after the marker are silent.
        assert!(out[10..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_underrun_does_not_advance() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.submit(&ramp(3), false);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 20];
        mixer.render(&mut out);
        assert_eq!(voice.samples_played(), 3);
        assert!(voice.is_running());

        voice.submit(&ramp(2), false);
        mixer.render(&mut out);
        assert_eq!(voice.samples_played(), 5);
    }

    #[test]
    fn test_frequency_ratio_steps_source() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.set_frequency_ratio(2.0);
        voice.submit(&ramp(40), false);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 20];
        mixer.render(&mut out);
        assert_eq!(voice.samples_played(), 20);

        voice.set_frequency_ratio(0.5);
        mixer.render(&mut out);
        assert_eq!(voice.samples_played(), 25);
    }

    #[test]
    fn test_frequency_ratio_clamped() {
        let voice = SourceVoice::new(format(1000, 8));
        voice.set_frequency_ratio(10.0);
        assert_eq!(voice.frequency_ratio(), 2.0);
        voice.set_frequency_ratio(0.0);
        assert_eq!(voice.frequency_ratio(), MIN_FREQUENCY_RATIO);
    }

    #[test]
    fn test_sample_rate_conversion() {
        let mixer = Mixer::new(2000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.submit(&ramp(10), false);
        voice.start().unwrap();

        let mut out = vec![0.0f32; 20];
        mixer.render(&mut out);
        // A 1 kHz voice on a 2 kHz device consumes one frame per two outputs.
        assert_eq!(voice.samples_played(), 5);
        assert_eq!(out[0], out[2]);
    }

    #[test]
    fn test_flush_and_destroy() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        voice.submit(&ramp(10), true);
        voice.flush();
        assert_eq!(voice.queued_samples(), 0);

        voice.destroy();
        assert!(voice.start().is_err());
        assert_eq!(voice.submit(&ramp(4), false), 0);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_shutdown_refuses_voices() {
        let mixer = Mixer::new(1000, 2);
        let voice = mixer.add_voice(format(1000, 64)).unwrap();
        mixer.shutdown();
        assert!(voice.is_destroyed());
        assert!(mixer.add_voice(format(1000, 64)).is_err());
    }
}
