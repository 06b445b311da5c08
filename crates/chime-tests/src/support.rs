//! Shared fixtures: a manager on a deterministic offline backend.

use chime_audio::{AudioConfig, AudioManager, OfflineBackend};
use chime_core::{ManualClock, Wave, WaveSample};
use std::sync::Arc;

pub const RATE: u32 = 300;

pub struct Rig {
    pub clock: Arc<ManualClock>,
    pub backend: Arc<OfflineBackend>,
    pub manager: AudioManager,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(AudioConfig::deterministic(RATE))
    }

    pub fn with_config(config: AudioConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(OfflineBackend::new(RATE, 2).unwrap());
        let manager = AudioManager::with_backend(backend.clone(), config, clock.clone());
        Self {
            clock,
            backend,
            manager,
        }
    }

    /// Feed, then let the "hardware" play `frames`.
    pub fn step(&self, frames: usize) -> Vec<f32> {
        self.manager.pump();
        self.backend.render(frames)
    }

    pub fn tick(&self, seconds: f64) {
        self.clock.advance_secs(seconds);
        self.manager.update_fade();
    }
}

/// Constant-level wave.
pub fn flat(len: usize, level: f32) -> Wave {
    Wave::new(RATE, vec![WaveSample::mono(level); len])
}
