//! Device-less backend rendered on demand.
//!
//! Plays the role of the audio hardware for headless runs and tests: nothing
//! is consumed until [`OfflineBackend::render`] is called, so playback time
//! advances exactly as far as the caller says.

use super::{AudioBackend, BackendKind, HardwareVoice, VoiceFormat};
use crate::mixer::Mixer;
use chime_core::{as_interleaved_mut, ChimeError, Result, Wave, WaveSample};
use std::sync::Arc;
use tracing::debug;

/// Software mixer without an output device.
pub struct OfflineBackend {
    mixer: Arc<Mixer>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(ChimeError::InvalidParameter(format!(
                "offline output needs a rate and channels, got {} Hz x {}",
                sample_rate, channels
            )));
        }
        debug!("Offline mixer at {} Hz, {} channels", sample_rate, channels);
        Ok(Self {
            mixer: Arc::new(Mixer::new(sample_rate, channels)),
        })
    }

    pub fn channels(&self) -> u16 {
        self.mixer.channels()
    }

    /// Render `frames` output frames, interleaved.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * self.mixer.channels() as usize];
        self.mixer.render(&mut out);
        out
    }

    /// Render into a caller-provided interleaved buffer.
    pub fn render_into(&self, output: &mut [f32]) {
        self.mixer.render(output);
    }

    /// Render `frames` output frames as a stereo wave at the output rate.
    ///
    /// Stereo output is mixed straight into the wave's frames. Mono output is
    /// copied to both channels; wider layouts keep their first two channels.
    pub fn render_wave(&self, frames: usize) -> Wave {
        let mut samples = vec![WaveSample::ZERO; frames];
        match self.mixer.channels() as usize {
            2 => self.mixer.render(as_interleaved_mut(&mut samples)),
            channels => {
                let interleaved = self.render(frames);
                for (frame, out) in interleaved.chunks_exact(channels).zip(samples.iter_mut()) {
                    *out = match frame {
                        [mono] => WaveSample::mono(*mono),
                        [left, right, ..] => WaveSample::new(*left, *right),
                        [] => WaveSample::ZERO,
                    };
                }
            }
        }
        Wave::new(self.mixer.sample_rate(), samples)
    }

    /// Live source voices in the mix.
    pub fn voice_count(&self) -> usize {
        self.mixer.voice_count()
    }
}

impl AudioBackend for OfflineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Offline
    }

    fn has_device(&self) -> bool {
        false
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn create_voice(&self, format: VoiceFormat) -> Result<Arc<dyn HardwareVoice>> {
        let voice = self.mixer.add_voice(format)?;
        Ok(voice)
    }

    fn set_master_volume(&self, volume: f64) {
        self.mixer.set_master_volume(volume);
    }

    fn master_volume(&self) -> f64 {
        self.mixer.master_volume()
    }

    fn shutdown(&self) {
        self.mixer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::WaveSample;

    #[test]
    fn test_render_plays_submitted_frames() {
        let backend = OfflineBackend::new(1000, 2).unwrap();
        let voice = backend
            .create_voice(VoiceFormat::new(1000, 2.0, 100))
            .unwrap();
        voice.submit(&[WaveSample::new(0.1, 0.2); 10], false);
        voice.start().unwrap();

        let out = backend.render(4);
        assert_eq!(out.len(), 8);
        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[1] - 0.2).abs() < 1e-6);
        assert_eq!(voice.samples_played(), 4);
        assert_eq!(voice.queued_samples(), 6);
    }

    #[test]
    fn test_render_wave_captures_stereo_output() {
        let backend = OfflineBackend::new(1000, 2).unwrap();
        let voice = backend
            .create_voice(VoiceFormat::new(1000, 2.0, 100))
            .unwrap();
        voice.submit(&[WaveSample::new(0.1, 0.2); 10], false);
        voice.start().unwrap();

        let wave = backend.render_wave(4);
        assert_eq!(wave.sample_rate(), 1000);
        assert_eq!(wave.len(), 4);
        assert!((wave[3].left - 0.1).abs() < 1e-6);
        assert!((wave[3].right - 0.2).abs() < 1e-6);
        assert_eq!(voice.samples_played(), 4);
    }

    #[test]
    fn test_render_wave_from_mono_output() {
        let backend = OfflineBackend::new(1000, 1).unwrap();
        let voice = backend
            .create_voice(VoiceFormat::new(1000, 2.0, 100))
            .unwrap();
        voice.submit(&[WaveSample::mono(0.25); 10], false);
        voice.start().unwrap();

        let wave = backend.render_wave(3);
        assert_eq!(wave.len(), 3);
        assert_eq!(wave[0].left, wave[0].right);
        assert!(wave[0].left > 0.0);
    }

    #[test]
    fn test_invalid_output_rejected() {
        assert!(OfflineBackend::new(0, 2).is_err());
        assert!(OfflineBackend::new(48000, 0).is_err());
    }

    #[test]
    fn test_shutdown_detaches_voices() {
        let backend = OfflineBackend::new(1000, 2).unwrap();
        let voice = backend
            .create_voice(VoiceFormat::new(1000, 2.0, 100))
            .unwrap();
        assert_eq!(backend.voice_count(), 1);
        backend.shutdown();
        assert_eq!(backend.voice_count(), 0);
        assert!(voice.start().is_err());
        assert!(backend
            .create_voice(VoiceFormat::new(1000, 2.0, 100))
            .is_err());
    }
}
