//! Fire-and-forget playback of a wave, bounded per voice.

use crate::backend::{AudioBackend, HardwareVoice, VoiceFormat};
use chime_core::{Result, Wave};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// One playing instance.
struct OneShot {
    id: u64,
    voice: Arc<dyn HardwareVoice>,
}

impl Drop for OneShot {
    fn drop(&mut self) {
        self.voice.destroy();
    }
}

/// Bounded FIFO of one-shot instances sharing one wave.
///
/// When the pool is full the oldest instance is destroyed to make room.
pub struct OneShotPool {
    backend: Arc<dyn AudioBackend>,
    wave: Arc<Wave>,
    max_shots: usize,
    max_speed: f64,
    shots: VecDeque<OneShot>,
    next_id: u64,
}

impl OneShotPool {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        wave: Arc<Wave>,
        max_shots: usize,
        max_speed: f64,
    ) -> Self {
        Self {
            backend,
            wave,
            max_shots: max_shots.max(1),
            max_speed,
            shots: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn max_shots(&self) -> usize {
        self.max_shots
    }

    /// Start a new instance of the whole wave. Returns its serial number, or
    /// `None` if no voice could be created.
    pub fn play_one_shot(&mut self, volume: f64, pitch: f64) -> Option<u64> {
        if self.shots.len() >= self.max_shots {
            if let Some(oldest) = self.shots.pop_front() {
                debug!(id = oldest.id, "Evicting oldest one-shot");
            }
        }

        let voice = match self.spawn_voice(volume, pitch) {
            Ok(voice) => voice,
            Err(e) => {
                warn!(error = %e, "Failed to start one-shot");
                return None;
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        self.shots.push_back(OneShot { id, voice });
        Some(id)
    }

    fn spawn_voice(&self, volume: f64, pitch: f64) -> Result<Arc<dyn HardwareVoice>> {
        let format = VoiceFormat::new(self.wave.sample_rate(), self.max_speed, self.wave.len());
        let voice = self.backend.create_voice(format)?;

        let volume = volume.clamp(0.0, 1.0) as f32;
        voice.set_channel_volumes(volume, volume);
        voice.set_frequency_ratio(pitch);
        voice.submit(self.wave.samples(), true);

        if let Err(e) = voice.start() {
            voice.destroy();
            return Err(e);
        }
        Ok(voice)
    }

    /// Destroy every instance.
    pub fn stop_all_shots(&mut self) {
        self.shots.clear();
    }

    /// Drop instances that played through to the end.
    pub fn reap_finished(&mut self) -> usize {
        let before = self.shots.len();
        self.shots.retain(|shot| !shot.voice.take_stream_end());
        before - self.shots.len()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    /// Serial numbers of live instances, oldest first.
    pub fn ids(&self) -> Vec<u64> {
        self.shots.iter().map(|shot| shot.id).collect()
    }
}

impl fmt::Debug for OneShotPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotPool")
            .field("live", &self.shots.len())
            .field("max_shots", &self.max_shots)
            .finish()
    }
}
