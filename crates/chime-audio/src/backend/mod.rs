//! Platform audio backends.
//!
//! The streaming, fade and manager layers are written once against the
//! [`AudioBackend`] and [`HardwareVoice`] traits. Concrete backends:
//! - [`NullBackend`]: no device; accepts every call and reports benign defaults
//! - [`OfflineBackend`]: software mixer rendered on demand, for headless runs and tests
//! - `NativeBackend`: cpal output stream (behind the `native` feature)

pub mod null;
pub mod offline;

#[cfg(feature = "native")]
pub mod native;

pub use null::{NullBackend, NullVoice};
pub use offline::OfflineBackend;

#[cfg(feature = "native")]
pub use native::NativeBackend;

use crate::config::AudioConfig;
use chime_core::{ChimeError, Result, WaveSample};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Which backend implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The platform output device.
    #[default]
    Native,
    /// Deterministic software rendering without a device.
    Offline,
    /// No output at all.
    Null,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Offline => write!(f, "offline"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// Format of a streaming source voice: always stereo `f32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceFormat {
    pub sample_rate: u32,
    /// Largest frequency ratio the voice will be asked to play at.
    pub max_frequency_ratio: f64,
    /// Frames the voice's queue can hold.
    pub queue_frames: usize,
}

impl VoiceFormat {
    pub const CHANNELS: u16 = 2;

    pub fn new(sample_rate: u32, max_frequency_ratio: f64, queue_frames: usize) -> Self {
        Self {
            sample_rate,
            max_frequency_ratio,
            queue_frames,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ChimeError::VoiceCreation("sample rate is zero".into()));
        }
        if self.queue_frames == 0 {
            return Err(ChimeError::VoiceCreation("queue size is zero".into()));
        }
        if !self.max_frequency_ratio.is_finite() || self.max_frequency_ratio <= 0.0 {
            return Err(ChimeError::VoiceCreation(format!(
                "invalid max frequency ratio {}",
                self.max_frequency_ratio
            )));
        }
        Ok(())
    }
}

/// An open audio device with a master output.
pub trait AudioBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether a real output device is attached.
    fn has_device(&self) -> bool;

    /// Output sample rate of the master voice.
    fn sample_rate(&self) -> u32;

    /// Allocate a streaming source voice.
    fn create_voice(&self, format: VoiceFormat) -> Result<Arc<dyn HardwareVoice>>;

    fn set_master_volume(&self, volume: f64);

    fn master_volume(&self) -> f64;

    /// Release the device. Voices created earlier become inert.
    fn shutdown(&self);
}

/// A streaming source voice owned by a backend.
///
/// All methods take `&self` and must not block: they are called from the
/// feeder thread and from the control thread concurrently.
pub trait HardwareVoice: Send + Sync {
    /// Start or resume consuming queued frames.
    fn start(&self) -> Result<()>;

    /// Suspend consumption, keeping the queue.
    fn stop(&self);

    /// Drop every queued frame.
    fn flush(&self);

    /// Stop, flush and detach from the backend. Idempotent.
    fn destroy(&self);

    /// Queue frames for playback. Returns how many were accepted. When
    /// `end_of_stream` is set and every frame was accepted, the voice stops
    /// by itself after playing the last one.
    fn submit(&self, frames: &[WaveSample], end_of_stream: bool) -> usize;

    /// Source frames consumed since creation.
    fn samples_played(&self) -> u64;

    /// Frames submitted but not yet consumed.
    fn queued_samples(&self) -> usize;

    fn is_running(&self) -> bool;

    /// Returns `true` once after the voice stopped at an end-of-stream marker.
    fn take_stream_end(&self) -> bool;

    fn set_channel_volumes(&self, left: f32, right: f32);

    fn channel_volumes(&self) -> (f32, f32);

    /// Set the playback rate multiplier, clamped to [`Self::frequency_ratio_range`].
    fn set_frequency_ratio(&self, ratio: f64);

    fn frequency_ratio(&self) -> f64;

    fn frequency_ratio_range(&self) -> (f64, f64);
}

/// Open the backend selected by `config`.
///
/// Fails with [`ChimeError::DeviceUnavailable`] when the native device cannot
/// be opened; callers that want silent degradation fall back to [`NullBackend`].
pub fn create_backend(config: &AudioConfig) -> Result<Arc<dyn AudioBackend>> {
    let backend: Arc<dyn AudioBackend> = match config.backend {
        BackendKind::Null => Arc::new(NullBackend::new()),
        BackendKind::Offline => Arc::new(OfflineBackend::new(
            config.offline_sample_rate,
            config.offline_channels,
        )?),
        BackendKind::Native => open_native()?,
    };
    info!(
        "Audio backend '{}' opened at {} Hz",
        backend.kind(),
        backend.sample_rate()
    );
    Ok(backend)
}

#[cfg(feature = "native")]
fn open_native() -> Result<Arc<dyn AudioBackend>> {
    Ok(Arc::new(NativeBackend::open()?))
}

#[cfg(not(feature = "native"))]
fn open_native() -> Result<Arc<dyn AudioBackend>> {
    Err(ChimeError::DeviceUnavailable(
        "built without the `native` feature".into(),
    ))
}
