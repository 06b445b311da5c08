//! Engine configuration, persisted as JSON.

use crate::backend::BackendKind;
use chime_core::limits::{DEFAULT_MAX_SPEED, DEFAULT_MAX_VOICE_SHOTS, MIN_FREQUENCY_RATIO};
use chime_core::{ChimeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How voice streams get their hardware queues topped up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// One feeder thread per stream, waking every `feed_interval_ms`.
    #[default]
    Thread,
    /// The host calls `AudioManager::pump` from its own loop.
    Polled,
}

/// Settings for the audio manager and its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Backend to open.
    pub backend: BackendKind,
    /// Interval of the fade-management thread, in milliseconds.
    pub fade_interval_ms: u64,
    pub feed_mode: FeedMode,
    /// Wake interval of each feeder thread, in milliseconds.
    pub feed_interval_ms: u64,
    /// Queued audio target is `sample_rate / buffer_divisor` frames.
    pub buffer_divisor: u32,
    /// Largest playback speed a voice is created for.
    pub max_speed: f64,
    /// Concurrent one-shot instances per voice.
    pub max_voice_shots: usize,
    pub offline_sample_rate: u32,
    pub offline_channels: u16,
    /// Length of the tone played by the null voice.
    pub null_tone_seconds: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Native,
            fade_interval_ms: 20,
            feed_mode: FeedMode::Thread,
            feed_interval_ms: 5,
            buffer_divisor: 30,
            max_speed: DEFAULT_MAX_SPEED,
            max_voice_shots: DEFAULT_MAX_VOICE_SHOTS,
            offline_sample_rate: 48_000,
            offline_channels: 2,
            null_tone_seconds: 0.5,
        }
    }
}

impl AudioConfig {
    /// Config for the deterministic offline backend.
    pub fn offline() -> Self {
        Self {
            backend: BackendKind::Offline,
            ..Self::default()
        }
    }

    /// Offline backend with polled feeding: nothing moves until the caller
    /// pumps and renders.
    pub fn deterministic(sample_rate: u32) -> Self {
        Self {
            backend: BackendKind::Offline,
            feed_mode: FeedMode::Polled,
            offline_sample_rate: sample_rate,
            ..Self::default()
        }
    }

    pub fn fade_interval(&self) -> Duration {
        Duration::from_millis(self.fade_interval_ms)
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.fade_interval_ms == 0 || self.feed_interval_ms == 0 {
            return Err(ChimeError::Config(
                "fade and feed intervals must be at least 1 ms".into(),
            ));
        }
        if self.buffer_divisor == 0 {
            return Err(ChimeError::Config("buffer_divisor must be positive".into()));
        }
        if !self.max_speed.is_finite() || self.max_speed < MIN_FREQUENCY_RATIO {
            return Err(ChimeError::Config(format!(
                "max_speed {} is out of range",
                self.max_speed
            )));
        }
        if self.max_voice_shots == 0 {
            return Err(ChimeError::Config("max_voice_shots must be positive".into()));
        }
        if self.offline_sample_rate == 0 || self.offline_channels == 0 {
            return Err(ChimeError::Config(
                "offline output needs a sample rate and channels".into(),
            ));
        }
        if !self.null_tone_seconds.is_finite() || self.null_tone_seconds <= 0.0 {
            return Err(ChimeError::Config(format!(
                "null_tone_seconds {} must be positive",
                self.null_tone_seconds
            )));
        }
        Ok(())
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| ChimeError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Deserialize and validate. Missing fields take their defaults.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data)
            .map_err(|e| ChimeError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}
