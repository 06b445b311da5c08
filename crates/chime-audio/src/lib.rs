//! Chime Audio - Playback engine
//!
//! Streams decoded waves to platform voices with timed fades, loop regions
//! and fire-and-forget one-shots.
//!
//! Architecture:
//! - `AudioBackend` / `HardwareVoice`: device abstraction with null, offline and native (cpal) backends
//! - `Mixer`: software mix of source voices, fed through lock-free SPSC `RingBuffer`s
//! - `VoiceStream`: feeds one wave into one hardware voice and tracks position
//! - `FadeControl`: play/pause/stop requests driven by periodic fade ticks
//! - `OneShotPool`: bounded FIFO of one-shot instances
//! - `AudioManager`: handle table, manager-wide lock and fade thread
//! - `Audio`: RAII handle with second- and decibel-based helpers

pub mod audio;
pub mod backend;
pub mod config;
pub mod fade;
pub mod manager;
pub mod mixer;
pub mod ring_buffer;
pub mod shots;
pub mod stream;
pub mod voice;

pub use audio::{db_to_gain, semitone_ratio, Audio};
pub use backend::{
    create_backend, AudioBackend, BackendKind, HardwareVoice, NullBackend, OfflineBackend,
    VoiceFormat,
};
pub use config::{AudioConfig, FeedMode};
pub use fade::{fade_in_volume, fade_out_volume, ControlState, FadeControl, LifecyclePhase, PlaybackTarget};
pub use manager::AudioManager;
pub use mixer::{Mixer, SourceVoice};
pub use ring_buffer::RingBuffer;
pub use shots::OneShotPool;
pub use stream::{StreamSettings, VoiceStream};
pub use voice::Voice;

pub use chime_core::{AudioId, ChimeError, LoopRegion, Result, Wave, WaveSample};
