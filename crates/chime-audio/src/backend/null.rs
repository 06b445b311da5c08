//! Device-less backend that accepts every call and does nothing.

use super::{AudioBackend, BackendKind, HardwareVoice, VoiceFormat};
use chime_core::{Result, WaveSample};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Backend used when no audio device is available.
#[derive(Debug)]
pub struct NullBackend {
    master_volume: AtomicU64,
}

impl NullBackend {
    pub const SAMPLE_RATE: u32 = 44_100;

    pub fn new() -> Self {
        Self {
            master_volume: AtomicU64::new(1.0f64.to_bits()),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn has_device(&self) -> bool {
        false
    }

    fn sample_rate(&self) -> u32 {
        Self::SAMPLE_RATE
    }

    fn create_voice(&self, format: VoiceFormat) -> Result<Arc<dyn HardwareVoice>> {
        format.validate()?;
        Ok(Arc::new(NullVoice::default()))
    }

    fn set_master_volume(&self, volume: f64) {
        self.master_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn master_volume(&self) -> f64 {
        f64::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    fn shutdown(&self) {}
}

/// A voice that never consumes anything.
///
/// Submissions report zero frames accepted, so a stream on this voice stays
/// parked at its last seek position and never reaches the end.
#[derive(Debug)]
pub struct NullVoice {
    running: AtomicBool,
    volumes: Mutex<(f32, f32)>,
}

impl Default for NullVoice {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            volumes: Mutex::new((1.0, 1.0)),
        }
    }
}

impl HardwareVoice for NullVoice {
    fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn flush(&self) {}

    fn destroy(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn submit(&self, _frames: &[WaveSample], _end_of_stream: bool) -> usize {
        0
    }

    fn samples_played(&self) -> u64 {
        0
    }

    fn queued_samples(&self) -> usize {
        0
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn take_stream_end(&self) -> bool {
        false
    }

    fn set_channel_volumes(&self, left: f32, right: f32) {
        *self.volumes.lock() = (left, right);
    }

    fn channel_volumes(&self) -> (f32, f32) {
        *self.volumes.lock()
    }

    fn set_frequency_ratio(&self, _ratio: f64) {}

    fn frequency_ratio(&self) -> f64 {
        1.0
    }

    fn frequency_ratio_range(&self) -> (f64, f64) {
        (1.0, 1.0)
    }
}
